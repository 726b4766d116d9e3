//! Reddit search as the social media source

use crate::error::{AnalysisError, Result};
use crate::model::{PostSentiment, SocialBundle, SocialPost};
use crate::providers::SocialProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

const REDDIT_SEARCH_URL: &str = "https://www.reddit.com/search.json";
const POST_LIMIT: u32 = 10;

/// Assigns polarity and subjectivity to a piece of text
pub trait PolarityScorer: Send + Sync {
    fn score(&self, text: &str) -> PostSentiment;
}

/// Scorer reporting every text as neutral
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralScorer;

impl PolarityScorer for NeutralScorer {
    fn score(&self, _text: &str) -> PostSentiment {
        PostSentiment::default()
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    #[serde(default)]
    title: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    author: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    num_comments: u64,
}

/// Recent posts mentioning a ticker, from Reddit's public search
pub struct RedditSocialProvider {
    client: Client,
    user_agent: String,
    scorer: Arc<dyn PolarityScorer>,
}

impl RedditSocialProvider {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            scorer: Arc::new(NeutralScorer),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn PolarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    fn to_post(&self, post: RedditPost) -> SocialPost {
        let sentiment = self.scorer.score(&format!("{} {}", post.title, post.selftext));
        SocialPost {
            created: DateTime::from_timestamp(post.created_utc as i64, 0).unwrap_or_else(Utc::now),
            title: post.title,
            score: post.score,
            author: post.author,
            sentiment,
            body: post.selftext,
            comment_count: post.num_comments,
        }
    }
}

#[async_trait]
impl SocialProvider for RedditSocialProvider {
    #[instrument(skip(self))]
    async fn fetch_posts(&self, ticker: &str) -> Result<SocialBundle> {
        let response = self
            .client
            .get(REDDIT_SEARCH_URL)
            .query(&[("q", format!("{ticker} stock")), ("limit", POST_LIMIT.to_string())])
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| AnalysisError::Api(format!("Reddit request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api(format!("Reddit API error {status}: {body}")));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| AnalysisError::Api(format!("Failed to parse Reddit response: {e}")))?;

        let posts: Vec<SocialPost> = listing
            .data
            .children
            .into_iter()
            .map(|child| self.to_post(child.data))
            .collect();

        debug!(count = posts.len(), "Fetched social posts");
        Ok(SocialBundle::from_posts(posts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer(f64);

    impl PolarityScorer for FixedScorer {
        fn score(&self, _text: &str) -> PostSentiment {
            PostSentiment {
                polarity: self.0,
                subjectivity: 0.5,
            }
        }
    }

    const LISTING: &str = r#"{"kind":"Listing","data":{"children":[
        {"kind":"t3","data":{"title":"AAPL earnings beat","score":321,"created_utc":1709303400.0,
         "author":"investor1","selftext":"Great quarter","num_comments":42}},
        {"kind":"t3","data":{"title":"Selling my AAPL","score":12,"created_utc":1709303500.0,
         "author":"investor2","selftext":"","num_comments":3}}
    ]}}"#;

    #[test]
    fn test_listing_mapping() {
        let provider = RedditSocialProvider::new(Client::new(), "test-agent")
            .with_scorer(Arc::new(FixedScorer(0.25)));
        let listing: Listing = serde_json::from_str(LISTING).unwrap();

        let posts: Vec<SocialPost> = listing
            .data
            .children
            .into_iter()
            .map(|child| provider.to_post(child.data))
            .collect();
        let bundle = SocialBundle::from_posts(posts);

        assert_eq!(bundle.posts.len(), 2);
        assert_eq!(bundle.posts[0].title, "AAPL earnings beat");
        assert_eq!(bundle.posts[0].body, "Great quarter");
        assert_eq!(bundle.posts[0].created.timestamp(), 1_709_303_400);
        assert_eq!(bundle.sentiment_summary.comment_count, 45);
        assert!((bundle.sentiment_summary.average_post_polarity - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_neutral_scorer_default() {
        let provider = RedditSocialProvider::new(Client::new(), "test-agent");
        let post = provider.to_post(RedditPost {
            title: "AAPL".to_string(),
            score: 1,
            created_utc: 0.0,
            author: String::new(),
            selftext: String::new(),
            num_comments: 0,
        });
        assert_eq!(post.sentiment, PostSentiment::default());
    }
}
