//! Multi-stage equity analysis
//!
//! This crate collects market data for a ticker over several user-driven
//! steps and turns it into a structured outlook. It includes:
//!
//! - A TTL-bound stage store keyed by user and ticker
//! - News retrieval that falls back from semantic search to a bulk news API
//! - Prompt assembly from prices, news, social sentiment and chat history
//! - A tolerant parser for labeled narrative responses
//! - Clients for Yahoo Finance, Finnhub, Reddit and OpenAI-compatible APIs
//!
//! # Example
//!
//! ```rust,ignore
//! use equity_analysis::{AnalysisConfig, AnalysisPipeline};
//! use std::sync::Arc;
//!
//! let pipeline = AnalysisPipeline::builder()
//!     .config(AnalysisConfig::default())
//!     .prices(Arc::new(prices))
//!     .news_search(Arc::new(index))
//!     .bulk_news(Arc::new(finnhub))
//!     .social(Arc::new(reddit))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! pipeline.begin_historical("user-1", "AAPL", "Will AAPL rise?").await?;
//! pipeline.fetch_news("user-1", "AAPL", "Will AAPL rise?").await?;
//! pipeline.fetch_social("user-1", "AAPL", "Will AAPL rise?").await?;
//! let result = pipeline.finalize("user-1", "AAPL", "Will AAPL rise?").await?;
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod index;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod retrieval;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, CollaboratorKind, ErrorClass, Result};
pub use history::InMemoryChatHistory;
pub use index::InMemoryNewsIndex;
pub use model::{ChatMetadata, ChatTurn, NewsItem, PriceSeries, SocialBundle, StageRecord};
pub use parser::{NarrativeSections, ParsedNarrative};
pub use pipeline::{AnalysisPipeline, AnalysisPipelineBuilder};
pub use providers::{
    BulkNewsProvider, ChatHistory, NewsSearch, PriceProvider, SocialProvider, TextGenerator,
};
pub use retrieval::{RetrievalChain, SourceTag};
pub use store::{StageKey, StageStore, TimedStageStore};
