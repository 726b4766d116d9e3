//! Prompt templates for synthesis and follow-up requests

use crate::error::Result;
use minijinja::Environment;
use serde::Serialize;

const SYNTHESIS: &str = "analysis.synthesis";
const FOLLOWUP: &str = "analysis.followup";

/// Instruction placed ahead of prior turns so earlier predictions stay stable
pub const CONSISTENCY_NOTE: &str = "Stay consistent with the answers above. Do not contradict any \
price prediction or target price stated there. If new information changes the picture, clarify \
and explain it instead of reversing the earlier call.";

const HISTORY_BLOCK: &str = r#"{% if history %}
===== PREVIOUS CONVERSATION HISTORY =====
{{ consistency_note }}

{% for turn in history %}Previous Question: {{ turn.query }}
Previous Answer: {{ turn.response }}

{% endfor %}{% endif %}"#;

const SYNTHESIS_TEMPLATE: &str = r#"You are an equity research assistant. Using only the data below, answer the question about {{ ticker }} and give a short-term price outlook.

QUESTION: {{ user_query }}

===== HISTORICAL DATA =====
{% if prices %}Last {{ prices|length }} trading days (date: close, volume):
{% for p in prices %}{{ p.date }}: ${{ p.price }}{% if p.volume %}, volume {{ p.volume }}{% endif %}
{% endfor %}
Current price: ${{ stats.current }}
Change over period: {{ stats.change_pct }}%
{% if stats.average_volume %}Average daily volume: {{ stats.average_volume }}
{% endif %}{% else %}No price data available.
{% endif %}
===== RECENT NEWS =====
{% for a in articles %}{{ loop.index }}. {{ a.title }} ({{ a.source }}, {{ a.published }})
   {{ a.summary }}
{% else %}No recent news available.
{% endfor %}
===== SOCIAL MEDIA SENTIMENT =====
Posts analysed: {{ sentiment.post_count }}, comments: {{ sentiment.comment_count }}
Average post polarity: {{ sentiment.post_polarity }} (subjectivity {{ sentiment.post_subjectivity }})
Average comment polarity: {{ sentiment.comment_polarity }} (subjectivity {{ sentiment.comment_subjectivity }})
{% for p in posts %}- [score {{ p.score }}, polarity {{ p.polarity }}] {{ p.title }}
{% endfor %}{% include "history" %}
===== ANALYSIS INSTRUCTIONS =====
Weigh the price trend, the news and the social sentiment together. Be specific about numbers and
say how confident you are. Use the previous conversation, if any, for context.

===== REQUIRED RESPONSE FORMAT =====
SUMMARY: <two or three sentences>
PRICE ANALYSIS: <trend, momentum and volume>
NEWS IMPACT: <how the news is likely to move the stock>
SENTIMENT ANALYSIS: <what social sentiment suggests>
PREDICTION: <expected direction and magnitude over the next week>
TARGET PRICE: <a single dollar amount, e.g. $123.45>
CONFIDENCE LEVEL: <Low, Medium or High>
RISK FACTORS: <main risks to the prediction>
"#;

const FOLLOWUP_TEMPLATE: &str = r#"You are an equity research assistant continuing a conversation about {{ ticker }}.
{% include "history" %}
===== CURRENT QUESTION =====
{{ user_query }}

===== INSTRUCTIONS =====
Answer the current question about {{ ticker }} directly. If you give or restate a prediction,
put it on lines starting with PREDICTION: and TARGET PRICE: so it can be tracked.
"#;

#[derive(Debug, Clone, Serialize)]
pub struct PriceRow {
    pub date: String,
    pub price: String,
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceStatsView {
    pub current: String,
    pub change_pct: String,
    pub average_volume: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleRow {
    pub title: String,
    pub source: String,
    pub published: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SentimentView {
    pub post_count: usize,
    pub comment_count: u64,
    pub post_polarity: String,
    pub post_subjectivity: String,
    pub comment_polarity: String,
    pub comment_subjectivity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostRow {
    pub title: String,
    pub score: i64,
    pub polarity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryTurn {
    pub query: String,
    pub response: String,
}

/// Variables of the synthesis prompt
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisVars {
    pub ticker: String,
    pub user_query: String,
    pub prices: Vec<PriceRow>,
    pub stats: PriceStatsView,
    pub articles: Vec<ArticleRow>,
    pub sentiment: SentimentView,
    pub posts: Vec<PostRow>,
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowupVars {
    pub ticker: String,
    pub user_query: String,
    pub history: Vec<HistoryTurn>,
}

/// Compiled prompt templates
pub struct PromptTemplates {
    env: Environment<'static>,
}

impl PromptTemplates {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_global("consistency_note", CONSISTENCY_NOTE);
        env.add_template("history", HISTORY_BLOCK)?;
        env.add_template(SYNTHESIS, SYNTHESIS_TEMPLATE)?;
        env.add_template(FOLLOWUP, FOLLOWUP_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn render_synthesis(&self, vars: &SynthesisVars) -> Result<String> {
        Ok(self.env.get_template(SYNTHESIS)?.render(vars)?)
    }

    pub fn render_followup(&self, vars: &FollowupVars) -> Result<String> {
        Ok(self.env.get_template(FOLLOWUP)?.render(vars)?)
    }
}
