//! Fixtures and in-memory collaborators shared by unit tests

use crate::error::{AnalysisError, Result};
use crate::model::{
    ChatMetadata, ChatTurn, NewsItem, PostSentiment, PricePoint, PriceSeries, SocialBundle,
    SocialPost,
};
use crate::providers::{PriceProvider, SocialProvider, TextGenerator};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed reference instant so fixtures compare equal across calls
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 22, 16, 0, 0).unwrap()
}

pub fn news_item(symbol: &str, title: &str, hours_ago: i64) -> NewsItem {
    let published = base_time() - Duration::hours(hours_ago);
    NewsItem {
        title: title.to_string(),
        summary: format!("Summary of {title}"),
        link: format!("https://news.example.com/{}", title.replace(' ', "-")),
        source: "Finnhub".to_string(),
        published,
        symbol: symbol.to_string(),
        timestamp: Utc::now(),
    }
}

/// `days` consecutive daily closes rising by one dollar a day from $150
pub fn price_series(days: u32) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    PriceSeries::from_points(
        (0..days)
            .map(|i| PricePoint {
                date: start + Duration::days(i64::from(i)),
                price: 150.0 + f64::from(i),
                volume: Some(1_000_000 + u64::from(i) * 1_000),
            })
            .collect(),
    )
}

pub fn social_post(title: &str, score: i64, polarity: f64) -> SocialPost {
    SocialPost {
        title: title.to_string(),
        score,
        created: base_time(),
        author: "trader".to_string(),
        sentiment: PostSentiment {
            polarity,
            subjectivity: 0.4,
        },
        body: format!("Body of {title}"),
        comment_count: 2,
    }
}

pub fn social_bundle() -> SocialBundle {
    SocialBundle::from_posts(vec![
        social_post("AAPL to the moon", 120, 0.6),
        social_post("Thinking of selling AAPL", 15, -0.3),
        social_post("AAPL earnings thread", 48, 0.1),
    ])
}

pub fn chat_turn(symbol: &str, query: &str, response: &str) -> ChatTurn {
    ChatTurn {
        query: query.to_string(),
        response: response.to_string(),
        metadata: ChatMetadata {
            symbol: symbol.to_string(),
            timestamp: base_time(),
            analysis_type: "multi-step".to_string(),
        },
    }
}

/// Price source returning the same series for every ticker
pub struct StaticPrices {
    series: PriceSeries,
    calls: AtomicUsize,
}

impl StaticPrices {
    pub fn new(series: PriceSeries) -> Self {
        Self {
            series,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceProvider for StaticPrices {
    async fn fetch_history(&self, _ticker: &str, _lookback_days: u32) -> Result<PriceSeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.series.clone())
    }
}

pub struct StaticSocial(pub SocialBundle);

#[async_trait]
impl SocialProvider for StaticSocial {
    async fn fetch_posts(&self, _ticker: &str) -> Result<SocialBundle> {
        Ok(self.0.clone())
    }
}

/// Generator replying with a fixed narrative and remembering prompts
pub struct ScriptedGenerator {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(AnalysisError::Api)
    }
}
