use super::*;
use crate::error::ErrorClass;
use crate::index::InMemoryNewsIndex;
use crate::model::SocialBundle;
use crate::providers::{MockBulkNewsProvider, MockChatHistory, MockPriceProvider};
use crate::retrieval::SourceTag;
use crate::testing::{
    ScriptedGenerator, StaticPrices, StaticSocial, news_item, price_series,
    social_bundle, social_post,
};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const NARRATIVE: &str = "SUMMARY: Apple shows positive momentum.\n\
    PRICE ANALYSIS: Steady climb over three weeks.\n\
    NEWS IMPACT: Product news is supportive.\n\
    SENTIMENT ANALYSIS: Bullish.\n\
    PREDICTION: AAPL will increase by 5-7% next week.\n\
    TARGET PRICE: $175.50\n\
    CONFIDENCE LEVEL: High\n\
    RISK FACTORS: Market volatility.";

struct Harness {
    pipeline: AnalysisPipeline,
    store: Arc<TimedStageStore>,
    history: Arc<InMemoryChatHistory>,
    generator: Arc<ScriptedGenerator>,
    prices: Arc<StaticPrices>,
}

impl Harness {
    async fn record(&self, user: &str, ticker: &str) -> Option<StageRecord> {
        let key = StageKey::new("multistep_prediction", user, ticker);
        self.store.get(&key).await.unwrap()
    }
}

/// Semantic index preloaded with two AAPL stories and a bulk source that
/// must never be consulted
async fn harness_with(config: AnalysisConfig, generator: ScriptedGenerator) -> Harness {
    let index = Arc::new(InMemoryNewsIndex::new());
    index
        .store(&[
            news_item("AAPL", "Apple unveils new iPhone", 30),
            news_item("AAPL", "Apple services revenue grows", 2),
        ])
        .await;

    let mut bulk = MockBulkNewsProvider::new();
    bulk.expect_fetch_recent().never();

    let store = Arc::new(TimedStageStore::new(config.stage_ttl));
    let history = Arc::new(InMemoryChatHistory::new());
    let generator = Arc::new(generator);
    let prices = Arc::new(StaticPrices::new(price_series(21)));

    let pipeline = AnalysisPipeline::builder()
        .config(config)
        .store(store.clone())
        .prices(prices.clone())
        .news_search(index)
        .bulk_news(Arc::new(bulk))
        .social(Arc::new(StaticSocial(social_bundle())))
        .generator(generator.clone())
        .history(history.clone())
        .build()
        .unwrap();

    Harness {
        pipeline,
        store,
        history,
        generator,
        prices,
    }
}

async fn harness() -> Harness {
    harness_with(AnalysisConfig::default(), ScriptedGenerator::replying(NARRATIVE)).await
}

#[tokio::test]
async fn test_full_flow() {
    let h = harness().await;
    let query = "will it rise?";

    let historical = assert_ok!(h.pipeline.begin_historical("u1", "AAPL", query).await);
    assert_eq!(historical.ticker, "AAPL");
    assert_eq!(historical.historical_prices.len(), 21);
    assert_eq!(historical.daily.len(), 21);

    let news = assert_ok!(h.pipeline.fetch_news("u1", "AAPL", query).await);
    assert_eq!(news.source_tag, SourceTag::SemanticSearch);
    assert_eq!(news.articles.len(), 2);

    let social = assert_ok!(h.pipeline.fetch_social("u1", "AAPL", query).await);
    assert_eq!(social.sentiment_summary.post_count, 3);

    let record = h.record("u1", "AAPL").await.unwrap();
    assert!(record.historical.is_some());
    assert!(record.news.is_some());
    assert!(record.social.is_some());

    let result = assert_ok!(h.pipeline.finalize("u1", "AAPL", query).await);
    assert_eq!(result.narrative, NARRATIVE);
    assert_eq!(result.target_price.as_deref(), Some("$175.50"));
    assert_eq!(result.parsed_sections.target_price(), Some("$175.50"));
    assert_eq!(result.user_query, query);
    assert!(h.record("u1", "AAPL").await.is_none());

    let prompts = h.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Apple services revenue grows"));

    let turns = h.history.recent("u1", 10).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].metadata.symbol, "AAPL");
    assert_eq!(turns[0].metadata.analysis_type, "multi-step");
}

#[tokio::test]
async fn test_finalize_twice_requires_restart() {
    let h = harness().await;
    h.pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();
    h.pipeline.fetch_news("u1", "AAPL", "q").await.unwrap();
    h.pipeline.fetch_social("u1", "AAPL", "q").await.unwrap();
    h.pipeline.finalize("u1", "AAPL", "q").await.unwrap();

    let err = assert_err!(h.pipeline.finalize("u1", "AAPL", "q").await);
    assert_eq!(err.to_string(), ANALYSIS_EXPIRED);
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_news_before_historical_is_sequencing_error() {
    let h = harness().await;

    let err = assert_err!(h.pipeline.fetch_news("u1", "AAPL", "q").await);
    assert!(matches!(err, AnalysisError::Sequencing(_)));
    assert_eq!(err.to_string(), HISTORICAL_EXPIRED);
    assert_eq!(err.class().status_code(), 400);

    let err = assert_err!(h.pipeline.fetch_social("u1", "AAPL", "q").await);
    assert_eq!(err.to_string(), PREVIOUS_STEPS_EXPIRED);
}

#[tokio::test]
async fn test_sessions_are_keyed_by_user_and_ticker() {
    let h = harness().await;
    h.pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();

    assert_err!(h.pipeline.fetch_news("u2", "AAPL", "q").await);
    assert_err!(h.pipeline.fetch_news("u1", "MSFT", "q").await);
    assert_ok!(h.pipeline.fetch_news("u1", "aapl ", "q").await);
}

#[tokio::test]
async fn test_missing_inputs_are_validation_errors() {
    let h = harness().await;

    let err = assert_err!(h.pipeline.begin_historical("u1", "AAPL", "  ").await);
    assert!(matches!(err, AnalysisError::Validation(_)));
    assert_eq!(err.to_string(), "Symbol and user_query are required");

    let err = assert_err!(h.pipeline.finalize("u1", "", "q").await);
    assert_eq!(err.class(), ErrorClass::Client);

    assert_err!(h.pipeline.followup("", "AAPL", "q").await);
    assert_eq!(h.prices.calls(), 0);
}

#[tokio::test]
async fn test_historical_again_clears_later_stages() {
    let h = harness().await;
    h.pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();
    h.pipeline.fetch_news("u1", "AAPL", "q").await.unwrap();
    h.pipeline.fetch_social("u1", "AAPL", "q").await.unwrap();

    h.pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();
    let record = h.record("u1", "AAPL").await.unwrap();
    assert!(record.historical.is_some());
    assert!(record.news.is_none());
    assert!(record.social.is_none());

    let err = assert_err!(h.pipeline.finalize("u1", "AAPL", "q").await);
    assert_eq!(err.to_string(), "Missing news data. Please complete all steps.");
}

#[tokio::test]
async fn test_finalize_reports_missing_social() {
    let h = harness().await;
    h.pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();
    h.pipeline.fetch_news("u1", "AAPL", "q").await.unwrap();

    let err = assert_err!(h.pipeline.finalize("u1", "AAPL", "q").await);
    assert_eq!(err.to_string(), "Missing social media data. Please complete all steps.");
    assert!(h.generator.prompts().is_empty());
}

#[tokio::test]
async fn test_social_stage_only_needs_a_record() {
    let h = harness().await;
    h.pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();

    assert_ok!(h.pipeline.fetch_social("u1", "AAPL", "q").await);
    let record = h.record("u1", "AAPL").await.unwrap();
    assert!(record.news.is_none());
    assert!(record.social.is_some());
}

#[tokio::test]
async fn test_generation_failure_keeps_record() {
    let h = harness_with(
        AnalysisConfig::default(),
        ScriptedGenerator::failing("LLM service unavailable"),
    )
    .await;
    h.pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();
    h.pipeline.fetch_news("u1", "AAPL", "q").await.unwrap();
    h.pipeline.fetch_social("u1", "AAPL", "q").await.unwrap();

    let err = assert_err!(h.pipeline.finalize("u1", "AAPL", "q").await);
    assert!(matches!(
        err,
        AnalysisError::Collaborator { collaborator: CollaboratorKind::TextGeneration, .. }
    ));
    assert!(err.to_string().contains("LLM service unavailable"));
    assert_eq!(err.class(), ErrorClass::Server);
    assert!(h.record("u1", "AAPL").await.is_some());
    assert!(h.history.recent("u1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_record_requires_restart() {
    let config = AnalysisConfig::builder()
        .stage_ttl(Duration::from_millis(50))
        .build()
        .unwrap();
    let h = harness_with(config, ScriptedGenerator::replying(NARRATIVE)).await;
    h.pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;

    let err = assert_err!(h.pipeline.fetch_news("u1", "AAPL", "q").await);
    assert!(matches!(err, AnalysisError::Sequencing(_)));
}

#[tokio::test]
async fn test_unstructured_narrative_is_not_an_error() {
    let h = harness_with(
        AnalysisConfig::default(),
        ScriptedGenerator::replying("The outlook is unclear."),
    )
    .await;
    h.pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();
    h.pipeline.fetch_news("u1", "AAPL", "q").await.unwrap();
    h.pipeline.fetch_social("u1", "AAPL", "q").await.unwrap();

    let result = assert_ok!(h.pipeline.finalize("u1", "AAPL", "q").await);
    assert!(!result.parsed_sections.is_structured());
    assert!(result.target_price.is_none());
}

#[tokio::test]
async fn test_followup_uses_prior_analysis() {
    let h = harness().await;
    h.pipeline.begin_historical("u1", "AAPL", "will it rise?").await.unwrap();
    h.pipeline.fetch_news("u1", "AAPL", "will it rise?").await.unwrap();
    h.pipeline.fetch_social("u1", "AAPL", "will it rise?").await.unwrap();
    h.pipeline.finalize("u1", "AAPL", "will it rise?").await.unwrap();

    let result = assert_ok!(h.pipeline.followup("u1", "aapl", "what about next month?").await);
    assert_eq!(result.target_price.as_deref(), Some("$175.50"));

    let prompts = h.generator.prompts();
    let followup_prompt = prompts.last().unwrap();
    assert!(followup_prompt.contains("AAPL"));
    assert!(followup_prompt.contains("what about next month?"));
    assert!(followup_prompt.contains("PREVIOUS CONVERSATION HISTORY"));
    assert!(followup_prompt.contains("Previous Question: will it rise?"));
    assert!(followup_prompt.contains("Previous Answer:"));

    let turns = h.history.recent("u1", 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].metadata.analysis_type, "followup");
}

#[tokio::test]
async fn test_social_view_is_trimmed() {
    let mut posts: Vec<_> = (0..12)
        .map(|i| social_post(&format!("post {i}"), i, 0.1))
        .collect();
    posts[11].body = "x".repeat(250);

    let index = Arc::new(InMemoryNewsIndex::new());
    let pipeline = AnalysisPipeline::builder()
        .prices(Arc::new(StaticPrices::new(price_series(5))))
        .news_search(index)
        .bulk_news(Arc::new(MockBulkNewsProvider::new()))
        .social(Arc::new(StaticSocial(SocialBundle::from_posts(posts))))
        .generator(Arc::new(ScriptedGenerator::replying(NARRATIVE)))
        .build()
        .unwrap();

    pipeline.begin_historical("u1", "AAPL", "q").await.unwrap();
    let social = pipeline.fetch_social("u1", "AAPL", "q").await.unwrap();

    assert_eq!(social.posts.len(), 10);
    assert_eq!(social.posts[0].score, 11);
    assert_eq!(social.posts[0].body.chars().count(), 203);
    assert!(social.posts[0].body.ends_with("..."));
    assert_eq!(social.sentiment_summary.post_count, 12);
}

#[tokio::test]
async fn test_price_failure_surfaces_message() {
    let mut prices = MockPriceProvider::new();
    prices
        .expect_fetch_history()
        .withf(|ticker, days| ticker == "AAPL" && *days == 21)
        .returning(|_, _| Err(AnalysisError::YahooFinance("Service unavailable".into())));

    let pipeline = AnalysisPipeline::builder()
        .prices(Arc::new(prices))
        .news_search(Arc::new(InMemoryNewsIndex::new()))
        .bulk_news(Arc::new(MockBulkNewsProvider::new()))
        .social(Arc::new(StaticSocial(social_bundle())))
        .generator(Arc::new(ScriptedGenerator::replying(NARRATIVE)))
        .build()
        .unwrap();

    let err = assert_err!(pipeline.begin_historical("u1", "AAPL", "q").await);
    assert!(err.to_string().contains("Service unavailable"));
    assert_eq!(err.class(), ErrorClass::Server);
}

#[tokio::test]
async fn test_history_failures_do_not_block_followup() {
    let mut history = MockChatHistory::new();
    history
        .expect_recent()
        .returning(|_, _| Err(AnalysisError::Store("history offline".into())));
    history
        .expect_append()
        .times(1)
        .returning(|_, _, _, _| Err(AnalysisError::Store("history offline".into())));

    let pipeline = AnalysisPipeline::builder()
        .prices(Arc::new(StaticPrices::new(price_series(5))))
        .news_search(Arc::new(InMemoryNewsIndex::new()))
        .bulk_news(Arc::new(MockBulkNewsProvider::new()))
        .social(Arc::new(StaticSocial(social_bundle())))
        .generator(Arc::new(ScriptedGenerator::replying(
            "Still constructive.\nTARGET PRICE: $175.00",
        )))
        .history(Arc::new(history))
        .build()
        .unwrap();

    let result = assert_ok!(pipeline.followup("u1", "AAPL", "any update?").await);
    assert_eq!(result.target_price.as_deref(), Some("$175.00"));
}

#[test]
fn test_builder_requires_collaborators() {
    let result = AnalysisPipeline::builder().build();
    assert!(matches!(result, Err(AnalysisError::Config(_))));
}
