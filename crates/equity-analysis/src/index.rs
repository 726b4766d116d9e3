//! In-process relevance index over recently ingested news

use crate::error::Result;
use crate::model::NewsItem;
use crate::providers::NewsSearch;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Items older than this, by ingestion time, are dropped
const DEFAULT_RETENTION_DAYS: i64 = 3;

struct IndexedItem {
    item: NewsItem,
    terms: HashMap<String, f64>,
}

/// News index ranking items by term-frequency cosine similarity.
///
/// Every ticker's items are searched independently. A query that shares no
/// terms with any item still returns the ticker's items, newest first.
pub struct InMemoryNewsIndex {
    items: RwLock<Vec<IndexedItem>>,
    retention: Duration,
}

impl Default for InMemoryNewsIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNewsIndex {
    pub fn new() -> Self {
        Self::with_retention(Duration::days(DEFAULT_RETENTION_DAYS))
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            retention,
        }
    }

    /// Add items, skipping articles already indexed, and prune stale ones.
    ///
    /// Returns the number of items added.
    pub async fn store(&self, items: &[NewsItem]) -> usize {
        let cutoff = Utc::now() - self.retention;
        let mut indexed = self.items.write().await;

        let before = indexed.len();
        indexed.retain(|entry| entry.item.timestamp >= cutoff);
        let pruned = before - indexed.len();

        let mut added = 0;
        for item in items {
            if item.timestamp < cutoff || indexed.iter().any(|entry| entry.item.same_article(item)) {
                continue;
            }
            indexed.push(IndexedItem {
                terms: term_frequencies(&format!("{} {}", item.title, item.summary)),
                item: item.clone(),
            });
            added += 1;
        }

        debug!(added, pruned, total = indexed.len(), "News index updated");
        added
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl NewsSearch for InMemoryNewsIndex {
    async fn search(&self, query: &str, ticker: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let query_terms = term_frequencies(query);
        let cutoff = Utc::now() - self.retention;
        let indexed = self.items.read().await;

        let mut hits: Vec<(f64, &NewsItem)> = indexed
            .iter()
            .filter(|entry| entry.item.symbol.eq_ignore_ascii_case(ticker))
            .filter(|entry| entry.item.timestamp >= cutoff)
            .map(|entry| (cosine_similarity(&query_terms, &entry.terms), &entry.item))
            .collect();

        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.published.cmp(&a.1.published))
        });
        hits.truncate(limit);

        Ok(hits.into_iter().map(|(_, item)| item.clone()).collect())
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut terms = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
    {
        *terms.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    terms
}

fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let norm_a = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.values().map(|y| y * y).sum::<f64>().sqrt();

    let denom = norm_a * norm_b;
    if denom <= f64::EPSILON {
        return 0.0;
    }
    dot / denom
}
