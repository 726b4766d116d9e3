//! Interfaces of the external services the pipeline depends on
//!
//! Each call is a single bounded request. Timeouts and retries, if any, are
//! the implementor's concern.

use crate::error::Result;
use crate::model::{ChatMetadata, ChatTurn, NewsItem, PriceSeries, SocialBundle};
use async_trait::async_trait;

/// Source of daily historical prices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Prices for the last `lookback_days` calendar days, oldest first
    async fn fetch_history(&self, ticker: &str, lookback_days: u32) -> Result<PriceSeries>;
}

/// Relevance search over previously ingested news
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSearch: Send + Sync {
    /// Up to `limit` items for `ticker`, most relevant to `query` first
    async fn search(&self, query: &str, ticker: &str, limit: usize) -> Result<Vec<NewsItem>>;
}

/// Unranked recent news straight from a provider.
///
/// Implementations also feed what they fetch into the search index.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BulkNewsProvider: Send + Sync {
    async fn fetch_recent(&self, ticker: &str, weeks: u32) -> Result<Vec<NewsItem>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialProvider: Send + Sync {
    async fn fetch_posts(&self, ticker: &str) -> Result<SocialBundle>;
}

/// Text-generation backend: prompt in, narrative out
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Per-user conversation log
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatHistory: Send + Sync {
    /// Most recent turns, newest first
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ChatTurn>>;

    async fn append(
        &self,
        user_id: &str,
        query: &str,
        response: &str,
        metadata: ChatMetadata,
    ) -> Result<()>;
}
