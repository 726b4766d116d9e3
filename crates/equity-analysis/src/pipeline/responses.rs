//! Stage responses shaped for display

use crate::model::{NewsItem, PricePoint, PriceSeries, SentimentSummary, SocialPost};
use crate::parser::ParsedNarrative;
use crate::retrieval::SourceTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalStage {
    pub ticker: String,
    pub historical_prices: PriceSeries,
    /// Per-day price and volume pairs
    pub daily: Vec<PricePoint>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleView {
    pub title: String,
    pub source: String,
    pub published: String,
    pub link: String,
    pub summary: String,
}

impl From<&NewsItem> for ArticleView {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            source: non_empty_or(&item.source, "Unknown"),
            published: item.published.to_rfc3339(),
            link: item.link.clone(),
            summary: non_empty_or(&item.summary, "No summary available"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsStage {
    pub articles: Vec<ArticleView>,
    pub source_tag: SourceTag,
    pub message: String,
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub title: String,
    pub score: i64,
    pub created: DateTime<Utc>,
    pub author: String,
    pub polarity: f64,
    pub body: String,
}

impl PostView {
    pub(crate) fn new(post: &SocialPost, body_chars: usize) -> Self {
        Self {
            title: post.title.clone(),
            score: post.score,
            created: post.created,
            author: post.author.clone(),
            polarity: post.sentiment.polarity,
            body: truncate_chars(&post.body, body_chars),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialStage {
    pub posts: Vec<PostView>,
    pub sentiment_summary: SentimentSummary,
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of the synthesis stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    /// Raw text returned by the generator
    pub narrative: String,
    pub parsed_sections: ParsedNarrative,
    pub target_price: Option<String>,
    pub ticker: String,
    pub user_query: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupResult {
    pub narrative: String,
    pub parsed_sections: ParsedNarrative,
    pub target_price: Option<String>,
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Cut `text` to `max` characters, marking the cut with an ellipsis
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
