//! Tiered news retrieval: semantic search, refresh and retry, direct fetch

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, CollaboratorKind, Result};
use crate::model::NewsItem;
use crate::providers::{BulkNewsProvider, NewsSearch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Which tier produced a set of news items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    SemanticSearch,
    BulkApi,
    None,
}

impl SourceTag {
    /// Message shown next to the articles
    pub fn describe(self) -> &'static str {
        match self {
            Self::SemanticSearch => "Articles ranked by relevance to your question",
            Self::BulkApi => "Most recent articles from the news provider",
            Self::None => "No recent news found for this ticker",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::SemanticSearch => "semantic_search",
            Self::BulkApi => "bulk_api",
            Self::None => "none",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub items: Vec<NewsItem>,
    pub source_tag: SourceTag,
}

impl RetrievalOutcome {
    fn semantic(items: Vec<NewsItem>) -> Self {
        Self {
            items,
            source_tag: SourceTag::SemanticSearch,
        }
    }

    fn exhausted() -> Self {
        Self {
            items: Vec::new(),
            source_tag: SourceTag::None,
        }
    }
}

/// Runs the retrieval tiers in order and stops at the first that yields items.
///
/// Passes run sequentially since each depends on the previous result.
pub struct RetrievalChain {
    search: Arc<dyn NewsSearch>,
    bulk: Arc<dyn BulkNewsProvider>,
    semantic_limit: usize,
    refresh_weeks: u32,
    direct_weeks: u32,
    display_limit: usize,
}

impl RetrievalChain {
    pub fn new(
        search: Arc<dyn NewsSearch>,
        bulk: Arc<dyn BulkNewsProvider>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            search,
            bulk,
            semantic_limit: config.semantic_limit,
            refresh_weeks: config.refresh_weeks,
            direct_weeks: config.direct_weeks,
            display_limit: config.news_display_limit,
        }
    }

    #[instrument(skip(self, query))]
    pub async fn retrieve(&self, ticker: &str, query: &str) -> Result<RetrievalOutcome> {
        let items = self.semantic_pass(ticker, query).await?;
        if !items.is_empty() {
            debug!(count = items.len(), "Semantic search satisfied the request");
            return Ok(RetrievalOutcome::semantic(items));
        }

        let refreshed = match self.bulk.fetch_recent(ticker, self.refresh_weeks).await {
            Ok(fetched) => {
                info!(count = fetched.len(), "Refreshed news index");
                let items = self.semantic_pass(ticker, query).await?;
                if !items.is_empty() {
                    return Ok(RetrievalOutcome::semantic(items));
                }
                fetched
            }
            Err(e) => {
                warn!("News refresh failed, falling back to direct fetch: {}", e);
                Vec::new()
            }
        };

        let bulk = if refreshed.is_empty() {
            self.bulk
                .fetch_recent(ticker, self.direct_weeks)
                .await
                .map_err(|e| AnalysisError::from_collaborator(CollaboratorKind::BulkNews, e))?
        } else {
            refreshed
        };

        let items = newest_first(bulk, self.display_limit);
        if items.is_empty() {
            info!("No news available from any source");
            return Ok(RetrievalOutcome::exhausted());
        }

        Ok(RetrievalOutcome {
            items,
            source_tag: SourceTag::BulkApi,
        })
    }

    async fn semantic_pass(&self, ticker: &str, query: &str) -> Result<Vec<NewsItem>> {
        self.search
            .search(query, ticker, self.semantic_limit)
            .await
            .map_err(|e| AnalysisError::from_collaborator(CollaboratorKind::NewsSearch, e))
    }
}

/// Drop repeated articles, order by publish time descending and cap the list
fn newest_first(items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    let mut unique: Vec<NewsItem> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.iter().any(|seen| seen.same_article(&item)) {
            unique.push(item);
        }
    }
    unique.sort_by(|a, b| b.published.cmp(&a.published));
    unique.truncate(limit);
    unique
}
