//! Configuration for the staged analysis pipeline

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_USER_AGENT: &str = "equity-analysis/0.1";

/// Configuration for the staged analysis pipeline and its collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Lifetime of a stage record after its last write
    pub stage_ttl: Duration,

    /// Prefix of stage record keys
    pub key_namespace: String,

    /// Calendar days of price history fetched by the historical stage
    pub price_lookback_days: u32,

    /// Items requested from the semantic index per query
    pub semantic_limit: usize,

    /// Weeks of bulk news ingested before the semantic retry
    pub refresh_weeks: u32,

    /// Weeks of bulk news fetched by the direct pass
    pub direct_weeks: u32,

    /// Articles returned by the news stage and the direct pass
    pub news_display_limit: usize,

    /// Posts returned by the social stage
    pub post_display_limit: usize,

    /// Characters of a post body kept for display
    pub post_body_chars: usize,

    /// Trading days of prices included in the synthesis prompt
    pub context_price_days: usize,

    /// Articles included in the synthesis prompt
    pub context_articles: usize,

    /// Posts included in the synthesis prompt
    pub context_posts: usize,

    /// Prior turns for the same ticker included in prompts
    pub context_history_turns: usize,

    /// Turns requested from chat history before filtering by ticker
    pub history_fetch_limit: usize,

    /// Token budget for the text-generation call
    pub max_tokens: usize,

    /// Request timeout for HTTP collaborators
    pub request_timeout: Duration,

    /// Finnhub requests per minute
    pub finnhub_rate_limit: u32,

    /// Finnhub API key (optional)
    pub finnhub_api_key: Option<String>,

    /// API key for the OpenAI-compatible backend (optional for local servers)
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible backend
    pub openai_api_base: String,

    /// Model name passed to the text-generation backend
    pub model: String,

    /// User agent sent to Reddit
    pub reddit_user_agent: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stage_ttl: Duration::from_secs(900), // 15 minutes
            key_namespace: "multistep_prediction".to_string(),
            price_lookback_days: 21,
            semantic_limit: 5,
            refresh_weeks: 2,
            direct_weeks: 1,
            news_display_limit: 10,
            post_display_limit: 10,
            post_body_chars: 200,
            context_price_days: 15,
            context_articles: 5,
            context_posts: 5,
            context_history_turns: 3,
            history_fetch_limit: 10,
            max_tokens: 2048,
            request_timeout: Duration::from_secs(120),
            finnhub_rate_limit: 60,
            finnhub_api_key: None,
            openai_api_key: None,
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            reddit_user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Load API keys and backend settings from the environment
    pub fn with_env_keys(mut self) -> Self {
        if let Ok(key) = std::env::var("FINNHUB_API_KEY") {
            self.finnhub_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            self.openai_api_base = base;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            self.model = model;
        }
        if let Ok(agent) = std::env::var("REDDIT_USER_AGENT") {
            self.reddit_user_agent = agent;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.stage_ttl.is_zero() {
            return Err(AnalysisError::Config(
                "stage_ttl must be greater than 0".to_string(),
            ));
        }

        if self.key_namespace.trim().is_empty() {
            return Err(AnalysisError::Config(
                "key_namespace must not be empty".to_string(),
            ));
        }

        if self.price_lookback_days == 0 || self.refresh_weeks == 0 || self.direct_weeks == 0 {
            return Err(AnalysisError::Config(
                "lookback windows must be greater than 0".to_string(),
            ));
        }

        let limits = [
            ("semantic_limit", self.semantic_limit),
            ("news_display_limit", self.news_display_limit),
            ("post_display_limit", self.post_display_limit),
            ("post_body_chars", self.post_body_chars),
            ("context_price_days", self.context_price_days),
            ("context_articles", self.context_articles),
            ("context_posts", self.context_posts),
            ("context_history_turns", self.context_history_turns),
            ("history_fetch_limit", self.history_fetch_limit),
            ("max_tokens", self.max_tokens),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(AnalysisError::Config(format!(
                "{name} must be greater than 0"
            )));
        }

        Ok(())
    }

    /// Finnhub key, required when the Finnhub provider is wired in
    pub fn require_finnhub_api_key(&self) -> Result<&str> {
        self.finnhub_api_key.as_deref().ok_or_else(|| {
            AnalysisError::Config("FINNHUB_API_KEY is required for bulk news".to_string())
        })
    }
}

/// Builder for AnalysisConfig
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    stage_ttl: Option<Duration>,
    key_namespace: Option<String>,
    price_lookback_days: Option<u32>,
    semantic_limit: Option<usize>,
    refresh_weeks: Option<u32>,
    direct_weeks: Option<u32>,
    max_tokens: Option<usize>,
    request_timeout: Option<Duration>,
    finnhub_api_key: Option<String>,
    openai_api_key: Option<String>,
    openai_api_base: Option<String>,
    model: Option<String>,
    load_env: bool,
}

impl AnalysisConfigBuilder {
    /// Set the stage record lifetime
    pub fn stage_ttl(mut self, ttl: Duration) -> Self {
        self.stage_ttl = Some(ttl);
        self
    }

    /// Set the stage record key prefix
    pub fn key_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.key_namespace = Some(namespace.into());
        self
    }

    /// Set the historical lookback in calendar days
    pub fn price_lookback_days(mut self, days: u32) -> Self {
        self.price_lookback_days = Some(days);
        self
    }

    /// Set the semantic search result limit
    pub fn semantic_limit(mut self, limit: usize) -> Self {
        self.semantic_limit = Some(limit);
        self
    }

    /// Set the refresh pass window in weeks
    pub fn refresh_weeks(mut self, weeks: u32) -> Self {
        self.refresh_weeks = Some(weeks);
        self
    }

    /// Set the direct pass window in weeks
    pub fn direct_weeks(mut self, weeks: u32) -> Self {
        self.direct_weeks = Some(weeks);
        self
    }

    /// Set the text-generation token budget
    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set Finnhub API key
    pub fn finnhub_api_key(mut self, key: impl Into<String>) -> Self {
        self.finnhub_api_key = Some(key.into());
        self
    }

    /// Set the OpenAI-compatible API key
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    /// Set the OpenAI-compatible API base URL
    pub fn openai_api_base(mut self, base: impl Into<String>) -> Self {
        self.openai_api_base = Some(base.into());
        self
    }

    /// Set the model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Fill unset keys from the environment at build time
    pub fn with_env_keys(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        let mut defaults = AnalysisConfig::default();
        if self.load_env {
            defaults = defaults.with_env_keys();
        }

        let config = AnalysisConfig {
            stage_ttl: self.stage_ttl.unwrap_or(defaults.stage_ttl),
            key_namespace: self.key_namespace.unwrap_or(defaults.key_namespace),
            price_lookback_days: self.price_lookback_days.unwrap_or(defaults.price_lookback_days),
            semantic_limit: self.semantic_limit.unwrap_or(defaults.semantic_limit),
            refresh_weeks: self.refresh_weeks.unwrap_or(defaults.refresh_weeks),
            direct_weeks: self.direct_weeks.unwrap_or(defaults.direct_weeks),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            finnhub_api_key: self.finnhub_api_key.or(defaults.finnhub_api_key),
            openai_api_key: self.openai_api_key.or(defaults.openai_api_key),
            openai_api_base: self.openai_api_base.unwrap_or(defaults.openai_api_base),
            model: self.model.unwrap_or(defaults.model),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}
