//! Prompt assembly from collected stage data and prior conversation

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, CollaboratorKind, Result};
use crate::model::{NewsItem, PriceSeries, SocialBundle};
use crate::prompts::{
    ArticleRow, FollowupVars, HistoryTurn, PostRow, PriceRow, PriceStatsView, PromptTemplates,
    SentimentView, SynthesisVars,
};
use crate::providers::ChatHistory;
use std::sync::Arc;
use tracing::{debug, warn};

/// Stage outputs the synthesis prompt is built from
#[derive(Debug, Clone, Copy)]
pub struct CollectedData<'a> {
    pub ticker: &'a str,
    pub prices: &'a PriceSeries,
    pub news: &'a [NewsItem],
    pub social: &'a SocialBundle,
}

/// Builds synthesis and follow-up prompts
pub struct ContextBuilder {
    history: Arc<dyn ChatHistory>,
    templates: PromptTemplates,
    price_days: usize,
    articles: usize,
    posts: usize,
    history_turns: usize,
    history_fetch_limit: usize,
}

impl ContextBuilder {
    pub fn new(history: Arc<dyn ChatHistory>, config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            history,
            templates: PromptTemplates::new()?,
            price_days: config.context_price_days,
            articles: config.context_articles,
            posts: config.context_posts,
            history_turns: config.context_history_turns,
            history_fetch_limit: config.history_fetch_limit,
        })
    }

    pub async fn synthesis_prompt(
        &self,
        user_id: &str,
        user_query: &str,
        data: CollectedData<'_>,
    ) -> Result<String> {
        let (prices, stats) = summarize_prices(data.prices, self.price_days);
        let vars = SynthesisVars {
            ticker: data.ticker.to_string(),
            user_query: user_query.to_string(),
            prices,
            stats,
            articles: article_rows(data.news, self.articles),
            sentiment: sentiment_view(data.social),
            posts: post_rows(data.social, self.posts),
            history: self.prior_turns(user_id, data.ticker).await,
        };
        self.templates.render_synthesis(&vars)
    }

    pub async fn followup_prompt(&self, user_id: &str, ticker: &str, user_query: &str) -> Result<String> {
        let vars = FollowupVars {
            ticker: ticker.to_string(),
            user_query: user_query.to_string(),
            history: self.prior_turns(user_id, ticker).await,
        };
        self.templates.render_followup(&vars)
    }

    /// Recent turns about `ticker`, oldest first. History is optional context,
    /// so a failed read yields no turns.
    async fn prior_turns(&self, user_id: &str, ticker: &str) -> Vec<HistoryTurn> {
        let turns = match self.history.recent(user_id, self.history_fetch_limit).await {
            Ok(turns) => turns,
            Err(e) => {
                let e = AnalysisError::from_collaborator(CollaboratorKind::ChatHistory, e);
                warn!(user_id, ticker, "Proceeding without chat history: {}", e);
                return Vec::new();
            }
        };

        let mut relevant: Vec<HistoryTurn> = turns
            .into_iter()
            .filter(|turn| turn.metadata.symbol.eq_ignore_ascii_case(ticker))
            .take(self.history_turns)
            .map(|turn| HistoryTurn {
                query: turn.query,
                response: turn.response,
            })
            .collect();
        relevant.reverse();

        debug!(count = relevant.len(), "Prior turns included in prompt");
        relevant
    }
}

fn summarize_prices(series: &PriceSeries, days: usize) -> (Vec<PriceRow>, PriceStatsView) {
    let points = series.points();
    let window = &points[points.len().saturating_sub(days)..];

    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return (Vec::new(), PriceStatsView::default());
    };

    let change_pct = if first.price.abs() < f64::EPSILON {
        0.0
    } else {
        (last.price - first.price) / first.price * 100.0
    };

    let volumes: Vec<u64> = window.iter().filter_map(|p| p.volume).collect();
    let average_volume = (volumes.len() == window.len())
        .then(|| volumes.iter().sum::<u64>() as f64 / volumes.len() as f64)
        .map(|avg| format!("{avg:.0}"));

    let rows = window
        .iter()
        .map(|p| PriceRow {
            date: p.date.format("%Y-%m-%d").to_string(),
            price: format!("{:.2}", p.price),
            volume: p.volume,
        })
        .collect();

    let stats = PriceStatsView {
        current: format!("{:.2}", last.price),
        change_pct: format!("{change_pct:+.2}"),
        average_volume,
    };
    (rows, stats)
}

fn article_rows(news: &[NewsItem], limit: usize) -> Vec<ArticleRow> {
    news.iter()
        .take(limit)
        .map(|item| ArticleRow {
            title: item.title.clone(),
            source: item.source.clone(),
            published: item.published.format("%Y-%m-%d").to_string(),
            summary: item.summary.clone(),
        })
        .collect()
}

fn sentiment_view(social: &SocialBundle) -> SentimentView {
    let summary = &social.sentiment_summary;
    SentimentView {
        post_count: summary.post_count,
        comment_count: summary.comment_count,
        post_polarity: format!("{:.3}", summary.average_post_polarity),
        post_subjectivity: format!("{:.3}", summary.average_post_subjectivity),
        comment_polarity: format!("{:.3}", summary.average_comment_polarity),
        comment_subjectivity: format!("{:.3}", summary.average_comment_subjectivity),
    }
}

fn post_rows(social: &SocialBundle, limit: usize) -> Vec<PostRow> {
    social
        .top_posts(limit)
        .into_iter()
        .map(|post| PostRow {
            title: post.title.clone(),
            score: post.score,
            polarity: format!("{:.3}", post.sentiment.polarity),
        })
        .collect()
}
