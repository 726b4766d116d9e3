//! Finnhub company news, used as the bulk news source

use crate::error::{AnalysisError, Result};
use crate::index::InMemoryNewsIndex;
use crate::model::NewsItem;
use crate::providers::BulkNewsProvider;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const FINNHUB_API_BASE: &str = "https://finnhub.io/api/v1";

/// Finnhub news article as returned by the company-news endpoint
#[derive(Debug, Clone, Deserialize)]
struct FinnhubArticle {
    /// Publish time (UNIX timestamp)
    #[serde(default)]
    datetime: i64,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    url: String,
}

/// Bulk news from Finnhub.
///
/// Fetched articles are also added to the news index when one is attached.
pub struct FinnhubNewsProvider {
    client: Client,
    api_key: String,
    api_base: String,
    rate_limiter: SharedRateLimiter,
    index: Option<Arc<InMemoryNewsIndex>>,
}

impl FinnhubNewsProvider {
    /// Create a new provider
    ///
    /// # Arguments
    /// * `api_key` - Finnhub API key
    /// * `rate_limit` - Requests per minute (free tier: 60)
    pub fn new(client: Client, api_key: impl Into<String>, rate_limit: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));

        Self {
            client,
            api_key: api_key.into(),
            api_base: FINNHUB_API_BASE.to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            index: None,
        }
    }

    /// Point the provider at another Finnhub-compatible endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Feed every fetched article into `index`
    pub fn with_index(mut self, index: Arc<InMemoryNewsIndex>) -> Self {
        self.index = Some(index);
        self
    }

    async fn company_news(&self, symbol: &str, from: &str, to: &str) -> Result<Vec<FinnhubArticle>> {
        self.rate_limiter.until_ready().await;

        // The token travels in the query string, so URLs are stripped from errors
        let response = self
            .client
            .get(format!("{}/company-news", self.api_base))
            .query(&[
                ("symbol", symbol),
                ("from", from),
                ("to", to),
                ("token", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AnalysisError::Api(format!("Finnhub request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api(format!("Finnhub API error {status}: {body}")));
        }

        response.json::<Vec<FinnhubArticle>>().await.map_err(|e| {
            AnalysisError::Api(format!("Failed to parse Finnhub response: {}", e.without_url()))
        })
    }
}

#[async_trait]
impl BulkNewsProvider for FinnhubNewsProvider {
    #[instrument(skip(self))]
    async fn fetch_recent(&self, ticker: &str, weeks: u32) -> Result<Vec<NewsItem>> {
        let to = Utc::now();
        let from = to - Duration::weeks(i64::from(weeks));

        let articles = self
            .company_news(
                ticker,
                &from.format("%Y-%m-%d").to_string(),
                &to.format("%Y-%m-%d").to_string(),
            )
            .await?;

        let ingested_at = Utc::now();
        let items: Vec<NewsItem> = articles
            .into_iter()
            .filter_map(|article| to_news_item(article, ticker, ingested_at))
            .collect();

        if let Some(index) = &self.index {
            index.store(&items).await;
        }

        debug!(count = items.len(), "Fetched company news");
        Ok(items)
    }
}

fn to_news_item(article: FinnhubArticle, ticker: &str, ingested_at: DateTime<Utc>) -> Option<NewsItem> {
    if article.headline.trim().is_empty() {
        return None;
    }

    Some(NewsItem {
        title: article.headline,
        summary: article.summary,
        link: article.url,
        source: "Finnhub".to_string(),
        published: DateTime::from_timestamp(article.datetime, 0).unwrap_or(ingested_at),
        symbol: ticker.to_string(),
        timestamp: ingested_at,
    })
}
