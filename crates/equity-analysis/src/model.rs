//! Data carried between pipeline stages

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single trading day of price data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

/// Daily closing prices over a lookback window, oldest first.
///
/// The three sequences are positionally aligned. `volumes` may be empty when
/// the price source does not report volume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<f64>,
    #[serde(default)]
    pub volumes: Vec<u64>,
}

impl PriceSeries {
    /// Build a series from points in any order
    pub fn from_points(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);

        let has_volume = points.iter().all(|p| p.volume.is_some());
        let mut series = Self::default();
        for point in points {
            series.dates.push(point.date);
            series.prices.push(point.price);
            if has_volume {
                series.volumes.push(point.volume.unwrap_or_default());
            }
        }
        series
    }

    pub fn len(&self) -> usize {
        self.dates.len().min(self.prices.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Day-by-day view of the series
    pub fn points(&self) -> Vec<PricePoint> {
        self.dates
            .iter()
            .zip(&self.prices)
            .enumerate()
            .map(|(i, (date, price))| PricePoint {
                date: *date,
                price: *price,
                volume: self.volumes.get(i).copied(),
            })
            .collect()
    }
}

/// A news article about one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub source: String,
    pub published: DateTime<Utc>,
    pub symbol: String,
    /// When the item was ingested
    pub timestamp: DateTime<Utc>,
}

impl NewsItem {
    /// Whether both items describe the same article
    pub fn same_article(&self, other: &NewsItem) -> bool {
        self.symbol == other.symbol && self.published == other.published && self.title == other.title
    }
}

/// Sentiment attached to a post by the social source
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PostSentiment {
    pub polarity: f64,
    pub subjectivity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub title: String,
    pub score: i64,
    pub created: DateTime<Utc>,
    pub author: String,
    pub sentiment: PostSentiment,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub comment_count: u64,
}

/// Aggregate sentiment over posts and their comments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub post_count: usize,
    pub comment_count: u64,
    pub average_post_polarity: f64,
    pub average_post_subjectivity: f64,
    pub average_comment_polarity: f64,
    pub average_comment_subjectivity: f64,
}

impl SentimentSummary {
    /// Summarize posts whose comments were not scored individually.
    ///
    /// Comment averages fall back to the post averages weighted by each
    /// post's comment count.
    pub fn from_posts(posts: &[SocialPost]) -> Self {
        if posts.is_empty() {
            return Self::default();
        }

        let count = posts.len() as f64;
        let average_post_polarity = posts.iter().map(|p| p.sentiment.polarity).sum::<f64>() / count;
        let average_post_subjectivity =
            posts.iter().map(|p| p.sentiment.subjectivity).sum::<f64>() / count;

        let comment_count: u64 = posts.iter().map(|p| p.comment_count).sum();
        let (average_comment_polarity, average_comment_subjectivity) = if comment_count == 0 {
            (0.0, 0.0)
        } else {
            let weight = comment_count as f64;
            let polarity = posts
                .iter()
                .map(|p| p.sentiment.polarity * p.comment_count as f64)
                .sum::<f64>()
                / weight;
            let subjectivity = posts
                .iter()
                .map(|p| p.sentiment.subjectivity * p.comment_count as f64)
                .sum::<f64>()
                / weight;
            (polarity, subjectivity)
        };

        Self {
            post_count: posts.len(),
            comment_count,
            average_post_polarity,
            average_post_subjectivity,
            average_comment_polarity,
            average_comment_subjectivity,
        }
    }
}

/// Posts for a ticker together with their aggregate sentiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialBundle {
    pub posts: Vec<SocialPost>,
    pub sentiment_summary: SentimentSummary,
}

impl SocialBundle {
    pub fn from_posts(posts: Vec<SocialPost>) -> Self {
        let sentiment_summary = SentimentSummary::from_posts(&posts);
        Self {
            posts,
            sentiment_summary,
        }
    }

    /// Posts ordered by score, highest first
    pub fn top_posts(&self, limit: usize) -> Vec<&SocialPost> {
        let mut posts: Vec<&SocialPost> = self.posts.iter().collect();
        posts.sort_by(|a, b| b.score.cmp(&a.score));
        posts.truncate(limit);
        posts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMetadata {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub analysis_type: String,
}

/// One question/answer exchange kept by the chat history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub query: String,
    pub response: String,
    pub metadata: ChatMetadata,
}

/// Outputs of completed stages for one (user, ticker) session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub ticker: String,
    pub user_query: String,
    pub created_at: DateTime<Utc>,
    pub historical: Option<PriceSeries>,
    pub news: Option<Vec<NewsItem>>,
    pub social: Option<SocialBundle>,
}

impl StageRecord {
    /// Fresh record holding only the historical stage output
    pub fn new(ticker: impl Into<String>, user_query: impl Into<String>, historical: PriceSeries) -> Self {
        Self {
            ticker: ticker.into(),
            user_query: user_query.into(),
            created_at: Utc::now(),
            historical: Some(historical),
            news: None,
            social: None,
        }
    }
}
