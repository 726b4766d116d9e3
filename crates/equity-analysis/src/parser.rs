//! Structured extraction from free-text analysis narratives
//!
//! Two layouts are recognized:
//!
//! - labeled blocks, where a line starting with an upper-case label such as
//!   `PREDICTION:` opens a field and unlabeled lines continue it
//! - a `[Prediction & Analysis]` block with `Prediction:`, `Analysis:` and
//!   `Target Price:` sub-labels
//!
//! A narrative with neither layout comes back as
//! [`ParsedNarrative::Unstructured`] holding the original text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const BRACKETED_MARKER: &str = "[Prediction & Analysis]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Summary,
    PriceAnalysis,
    NewsImpact,
    SentimentAnalysis,
    Prediction,
    TargetPrice,
    Confidence,
    RiskFactors,
}

const FIELD_COUNT: usize = 8;

const LABELS: &[(&str, Field)] = &[
    ("SUMMARY", Field::Summary),
    ("PRICE ANALYSIS", Field::PriceAnalysis),
    ("NEWS IMPACT", Field::NewsImpact),
    ("SENTIMENT ANALYSIS", Field::SentimentAnalysis),
    ("PREDICTION", Field::Prediction),
    ("TARGET PRICE", Field::TargetPrice),
    ("CONFIDENCE LEVEL", Field::Confidence),
    ("CONFIDENCE", Field::Confidence),
    ("RISK FACTORS", Field::RiskFactors),
];

const BRACKETED_LABELS: &[(&str, Field)] = &[
    ("Prediction", Field::Prediction),
    ("Analysis", Field::PriceAnalysis),
    ("Target Price", Field::TargetPrice),
];

/// Fields extracted from a recognized narrative layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSections {
    pub summary: String,
    pub price_analysis: String,
    pub news_impact: String,
    pub sentiment_analysis: String,
    pub prediction: String,
    pub target_price: Option<String>,
    pub confidence: String,
    pub risk_factors: String,
}

/// Result of parsing a narrative.
///
/// `Unstructured` is a normal outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedNarrative {
    Structured(NarrativeSections),
    Unstructured { full_response: String },
}

impl ParsedNarrative {
    pub fn target_price(&self) -> Option<&str> {
        match self {
            Self::Structured(sections) => sections.target_price.as_deref(),
            Self::Unstructured { .. } => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Labeled,
    Bracketed,
}

/// Line-by-line state: the layout in force and the field being filled
struct ParseState {
    mode: Mode,
    open: Option<Field>,
    fields: [String; FIELD_COUNT],
}

impl ParseState {
    fn new() -> Self {
        Self {
            mode: Mode::Labeled,
            open: None,
            fields: Default::default(),
        }
    }

    fn open_field(&mut self, field: Field, value: &str) {
        self.open = Some(field);
        let slot = &mut self.fields[field as usize];
        slot.clear();
        slot.push_str(value);
    }

    fn continue_field(&mut self, text: &str) {
        let Some(field) = self.open else {
            return;
        };
        let slot = &mut self.fields[field as usize];
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
    }

    fn feed(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        let cleaned = strip_decorations(trimmed);

        if cleaned.eq_ignore_ascii_case(BRACKETED_MARKER) {
            self.mode = Mode::Bracketed;
            self.open = None;
            return;
        }
        if cleaned.starts_with('[') && cleaned.ends_with(']') {
            self.mode = Mode::Labeled;
            self.open = None;
            return;
        }

        if let Some((field, value)) = match_label(cleaned, LABELS) {
            self.mode = Mode::Labeled;
            self.open_field(field, value);
            return;
        }

        if self.mode == Mode::Bracketed {
            if let Some((field, value)) = match_label(cleaned, BRACKETED_LABELS) {
                self.open_field(field, value);
                return;
            }
        }

        self.continue_field(trimmed);
    }

    fn finish(self) -> Option<NarrativeSections> {
        if self.fields.iter().all(|f| f.trim().is_empty()) {
            return None;
        }

        let [
            summary,
            price_analysis,
            news_impact,
            sentiment_analysis,
            prediction,
            target_price,
            confidence,
            risk_factors,
        ] = self.fields.map(|f| f.trim().to_string());

        Some(NarrativeSections {
            summary,
            price_analysis,
            news_impact,
            sentiment_analysis,
            prediction,
            target_price: (!target_price.is_empty()).then_some(target_price),
            confidence,
            risk_factors,
        })
    }
}

/// Parse a narrative into sections, degrading to the raw text when no
/// layout is recognized
pub fn parse(narrative: &str) -> ParsedNarrative {
    let mut state = ParseState::new();
    for line in narrative.lines() {
        state.feed(line);
    }

    match state.finish() {
        Some(mut sections) => {
            recover_target_price(&mut sections, narrative);
            ParsedNarrative::Structured(sections)
        }
        None => ParsedNarrative::Unstructured {
            full_response: narrative.to_string(),
        },
    }
}

fn currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\d+(?:,\d{3})*(?:\.\d+)?").expect("currency regex must compile")
    })
}

fn first_amount(text: &str) -> Option<String> {
    currency_re().find(text).map(|m| m.as_str().to_string())
}

/// Fill `target_price` and make sure the prediction mentions it.
///
/// In the full-text fallback the second amount wins when there are several,
/// since the first usually quotes the current price.
fn recover_target_price(sections: &mut NarrativeSections, narrative: &str) {
    let recovered = match sections.target_price.take() {
        Some(explicit) => Some(first_amount(&explicit).unwrap_or(explicit)),
        None => first_amount(&sections.prediction).or_else(|| {
            let amounts: Vec<&str> = currency_re()
                .find_iter(narrative)
                .map(|m| m.as_str())
                .collect();
            amounts.get(1).or_else(|| amounts.first()).map(|s| (*s).to_string())
        }),
    };

    if let Some(price) = &recovered {
        if sections.prediction.is_empty() {
            sections.prediction = format!("(Target Price: {price})");
        } else if !sections.prediction.contains(price.as_str()) {
            sections.prediction = format!("{} (Target Price: {price})", sections.prediction);
        }
    }
    sections.target_price = recovered;
}

/// Drop markdown headings, bullets, emphasis and list numbering before a label
fn strip_decorations(line: &str) -> &str {
    let is_decoration = |c: char| matches!(c, '#' | '*' | '-' | '>') || c.is_whitespace();
    let rest = line.trim_start_matches(is_decoration);

    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let after = &rest[digits..];
        if let Some(stripped) = after.strip_prefix('.').or_else(|| after.strip_prefix(')')) {
            return stripped.trim_start_matches(is_decoration);
        }
    }
    rest
}

fn match_label<'a>(line: &'a str, labels: &[(&str, Field)]) -> Option<(Field, &'a str)> {
    labels.iter().find_map(|(label, field)| {
        let rest = line.strip_prefix(label)?.trim_start_matches('*');
        let value = rest.strip_prefix(':')?;
        Some((*field, value.trim_start_matches('*').trim()))
    })
}
