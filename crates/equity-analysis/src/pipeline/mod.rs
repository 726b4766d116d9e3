//! The staged analysis flow
//!
//! A session for one (user, ticker) runs four stages in order:
//!
//! 1. [`AnalysisPipeline::begin_historical`] fetches prices and starts a fresh record
//! 2. [`AnalysisPipeline::fetch_news`] adds news from the retrieval chain
//! 3. [`AnalysisPipeline::fetch_social`] adds social posts and sentiment
//! 4. [`AnalysisPipeline::finalize`] generates, parses and stores the narrative,
//!    then clears the record
//!
//! Intermediate results live in a [`StageStore`] and expire when a session is
//! left idle. [`AnalysisPipeline::followup`] answers later questions from chat
//! history alone.

mod responses;

#[cfg(test)]
mod tests;

pub use responses::{
    ArticleView, FinalResult, FollowupResult, HistoricalStage, NewsStage, PostView, SocialStage,
};

use crate::config::AnalysisConfig;
use crate::context::{CollectedData, ContextBuilder};
use crate::error::{AnalysisError, CollaboratorKind, Result};
use crate::history::InMemoryChatHistory;
use crate::model::{ChatMetadata, StageRecord};
use crate::parser::{self, ParsedNarrative};
use crate::providers::{
    BulkNewsProvider, ChatHistory, NewsSearch, PriceProvider, SocialProvider, TextGenerator,
};
use crate::retrieval::RetrievalChain;
use crate::store::{StageKey, StageStore, TimedStageStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const ANALYSIS_TYPE_MULTI_STEP: &str = "multi-step";
const ANALYSIS_TYPE_FOLLOWUP: &str = "followup";

const HISTORICAL_EXPIRED: &str = "Historical data not found or expired. Please restart the analysis.";
const PREVIOUS_STEPS_EXPIRED: &str =
    "Previous steps data not found or expired. Please restart the analysis.";
const ANALYSIS_EXPIRED: &str = "Analysis data not found or expired. Please restart the analysis.";

/// Coordinates the four analysis stages and follow-up questions
pub struct AnalysisPipeline {
    config: AnalysisConfig,
    store: Arc<dyn StageStore>,
    prices: Arc<dyn PriceProvider>,
    retrieval: RetrievalChain,
    social: Arc<dyn SocialProvider>,
    generator: Arc<dyn TextGenerator>,
    history: Arc<dyn ChatHistory>,
    context: ContextBuilder,
}

impl AnalysisPipeline {
    pub fn builder() -> AnalysisPipelineBuilder {
        AnalysisPipelineBuilder::new()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Stage 1: fetch price history and start a fresh record.
    ///
    /// Any earlier record for the same user and ticker is replaced, which
    /// discards its news and social data.
    #[instrument(skip(self, user_query))]
    pub async fn begin_historical(
        &self,
        user_id: &str,
        ticker: &str,
        user_query: &str,
    ) -> Result<HistoricalStage> {
        let ticker = validate(user_id, ticker, user_query)?;

        let series = self
            .prices
            .fetch_history(&ticker, self.config.price_lookback_days)
            .await
            .map_err(|e| AnalysisError::from_collaborator(CollaboratorKind::Price, e))?;

        let record = StageRecord::new(&ticker, user_query, series.clone());
        self.store.put(&self.key(user_id, &ticker), record).await?;

        info!(days = series.len(), "Historical stage complete");
        Ok(HistoricalStage {
            daily: series.points(),
            historical_prices: series,
            ticker,
            timestamp: Utc::now(),
        })
    }

    /// Stage 2: retrieve news relevant to the question
    #[instrument(skip(self, user_query))]
    pub async fn fetch_news(&self, user_id: &str, ticker: &str, user_query: &str) -> Result<NewsStage> {
        let ticker = validate(user_id, ticker, user_query)?;
        let key = self.key(user_id, &ticker);
        let mut record = self.load(&key, HISTORICAL_EXPIRED).await?;

        let outcome = self.retrieval.retrieve(&ticker, user_query).await?;
        let articles: Vec<ArticleView> = outcome
            .items
            .iter()
            .take(self.config.news_display_limit)
            .map(ArticleView::from)
            .collect();

        record.news = Some(outcome.items);
        self.store.put(&key, record).await?;

        info!(source = %outcome.source_tag, "News stage complete");
        Ok(NewsStage {
            articles,
            source_tag: outcome.source_tag,
            message: outcome.source_tag.describe().to_string(),
            ticker,
            timestamp: Utc::now(),
        })
    }

    /// Stage 3: fetch social posts and their sentiment
    #[instrument(skip(self, user_query))]
    pub async fn fetch_social(
        &self,
        user_id: &str,
        ticker: &str,
        user_query: &str,
    ) -> Result<SocialStage> {
        let ticker = validate(user_id, ticker, user_query)?;
        let key = self.key(user_id, &ticker);
        let mut record = self.load(&key, PREVIOUS_STEPS_EXPIRED).await?;

        let bundle = self
            .social
            .fetch_posts(&ticker)
            .await
            .map_err(|e| AnalysisError::from_collaborator(CollaboratorKind::Social, e))?;

        let posts: Vec<PostView> = bundle
            .top_posts(self.config.post_display_limit)
            .into_iter()
            .map(|post| PostView::new(post, self.config.post_body_chars))
            .collect();
        let sentiment_summary = bundle.sentiment_summary.clone();

        record.social = Some(bundle);
        self.store.put(&key, record).await?;

        info!("Social stage complete");
        Ok(SocialStage {
            posts,
            sentiment_summary,
            ticker,
            timestamp: Utc::now(),
        })
    }

    /// Stage 4: synthesize the narrative from all collected data.
    ///
    /// The record is cleared on success, so a second call fails until the
    /// flow is restarted. A generation failure leaves the record in place.
    #[instrument(skip(self, user_query))]
    pub async fn finalize(&self, user_id: &str, ticker: &str, user_query: &str) -> Result<FinalResult> {
        let ticker = validate(user_id, ticker, user_query)?;
        let key = self.key(user_id, &ticker);
        let record = self.load(&key, ANALYSIS_EXPIRED).await?;

        let prices = record.historical.as_ref().ok_or_else(|| missing("historical"))?;
        let news = record.news.as_deref().ok_or_else(|| missing("news"))?;
        let social = record.social.as_ref().ok_or_else(|| missing("social media"))?;

        let prompt = self
            .context
            .synthesis_prompt(
                user_id,
                user_query,
                CollectedData {
                    ticker: &ticker,
                    prices,
                    news,
                    social,
                },
            )
            .await?;

        let (narrative, parsed) = self.generate(&prompt).await?;
        self.remember(user_id, &ticker, user_query, &narrative, ANALYSIS_TYPE_MULTI_STEP)
            .await;

        if let Err(e) = self.store.delete(&key).await {
            warn!("Failed to clear stage record: {}", e);
        }

        info!(structured = parsed.is_structured(), "Analysis complete");
        Ok(FinalResult {
            target_price: parsed.target_price().map(str::to_string),
            narrative,
            parsed_sections: parsed,
            ticker,
            user_query: user_query.to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Answer a question about a ticker from prior conversation only
    #[instrument(skip(self, user_query))]
    pub async fn followup(
        &self,
        user_id: &str,
        ticker: &str,
        user_query: &str,
    ) -> Result<FollowupResult> {
        let ticker = validate(user_id, ticker, user_query)?;

        let prompt = self.context.followup_prompt(user_id, &ticker, user_query).await?;
        let (narrative, parsed) = self.generate(&prompt).await?;
        self.remember(user_id, &ticker, user_query, &narrative, ANALYSIS_TYPE_FOLLOWUP)
            .await;

        Ok(FollowupResult {
            target_price: parsed.target_price().map(str::to_string),
            narrative,
            parsed_sections: parsed,
        })
    }

    fn key(&self, user_id: &str, ticker: &str) -> StageKey {
        StageKey::new(&self.config.key_namespace, user_id, ticker)
    }

    async fn load(&self, key: &StageKey, expired: &str) -> Result<StageRecord> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| AnalysisError::Sequencing(expired.to_string()))
    }

    async fn generate(&self, prompt: &str) -> Result<(String, ParsedNarrative)> {
        let narrative = self
            .generator
            .generate(prompt)
            .await
            .map_err(|e| AnalysisError::from_collaborator(CollaboratorKind::TextGeneration, e))?;
        let parsed = parser::parse(&narrative);
        Ok((narrative, parsed))
    }

    /// Append the exchange to chat history. Failures are logged only.
    async fn remember(
        &self,
        user_id: &str,
        ticker: &str,
        query: &str,
        response: &str,
        analysis_type: &str,
    ) {
        let metadata = ChatMetadata {
            symbol: ticker.to_string(),
            timestamp: Utc::now(),
            analysis_type: analysis_type.to_string(),
        };
        if let Err(e) = self.history.append(user_id, query, response, metadata).await {
            let e = AnalysisError::from_collaborator(CollaboratorKind::ChatHistory, e);
            warn!("Failed to save chat history: {}", e);
        }
    }
}

/// Check required inputs and return the normalized ticker
fn validate(user_id: &str, ticker: &str, user_query: &str) -> Result<String> {
    if user_id.trim().is_empty() {
        return Err(AnalysisError::Validation("user_id is required".to_string()));
    }
    if ticker.trim().is_empty() || user_query.trim().is_empty() {
        return Err(AnalysisError::Validation(
            "Symbol and user_query are required".to_string(),
        ));
    }
    Ok(ticker.trim().to_uppercase())
}

fn missing(what: &str) -> AnalysisError {
    AnalysisError::Sequencing(format!("Missing {what} data. Please complete all steps."))
}

/// Builder for AnalysisPipeline
pub struct AnalysisPipelineBuilder {
    config: AnalysisConfig,
    store: Option<Arc<dyn StageStore>>,
    prices: Option<Arc<dyn PriceProvider>>,
    search: Option<Arc<dyn NewsSearch>>,
    bulk: Option<Arc<dyn BulkNewsProvider>>,
    social: Option<Arc<dyn SocialProvider>>,
    generator: Option<Arc<dyn TextGenerator>>,
    history: Option<Arc<dyn ChatHistory>>,
}

impl AnalysisPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
            store: None,
            prices: None,
            search: None,
            bulk: None,
            social: None,
            generator: None,
            history: None,
        }
    }

    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Stage store; defaults to an in-process store using the configured TTL
    pub fn store(mut self, store: Arc<dyn StageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn prices(mut self, prices: Arc<dyn PriceProvider>) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn news_search(mut self, search: Arc<dyn NewsSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn bulk_news(mut self, bulk: Arc<dyn BulkNewsProvider>) -> Self {
        self.bulk = Some(bulk);
        self
    }

    pub fn social(mut self, social: Arc<dyn SocialProvider>) -> Self {
        self.social = Some(social);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Chat history; defaults to an in-process history
    pub fn history(mut self, history: Arc<dyn ChatHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Build the pipeline
    ///
    /// Fails if the configuration is invalid or a collaborator is missing.
    pub fn build(self) -> Result<AnalysisPipeline> {
        self.config.validate()?;

        let required = |name: &str| AnalysisError::Config(format!("{name} not set"));
        let prices = self.prices.ok_or_else(|| required("price provider"))?;
        let search = self.search.ok_or_else(|| required("news search"))?;
        let bulk = self.bulk.ok_or_else(|| required("bulk news provider"))?;
        let social = self.social.ok_or_else(|| required("social provider"))?;
        let generator = self.generator.ok_or_else(|| required("text generator"))?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(TimedStageStore::new(self.config.stage_ttl)));
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(InMemoryChatHistory::new()));

        Ok(AnalysisPipeline {
            retrieval: RetrievalChain::new(search, bulk, &self.config),
            context: ContextBuilder::new(Arc::clone(&history), &self.config)?,
            config: self.config,
            store,
            prices,
            social,
            generator,
            history,
        })
    }
}

impl Default for AnalysisPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
