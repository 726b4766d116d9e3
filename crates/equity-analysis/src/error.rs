//! Error types for equity analysis operations

use std::fmt;
use thiserror::Error;

/// External collaborator a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollaboratorKind {
    /// Historical price source
    Price,
    /// Semantic news search index
    NewsSearch,
    /// Bulk news provider
    BulkNews,
    /// Social media source
    Social,
    /// Text-generation backend
    TextGeneration,
    /// Chat history store
    ChatHistory,
}

impl fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Price => "price source",
            Self::NewsSearch => "news search",
            Self::BulkNews => "bulk news provider",
            Self::Social => "social source",
            Self::TextGeneration => "text generation",
            Self::ChatHistory => "chat history",
        };
        f.write_str(name)
    }
}

/// Which side of a request an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller sent bad input or called stages out of order
    Client,
    /// A dependency failed
    Server,
}

impl ErrorClass {
    /// Conventional HTTP status for hosts exposing the pipeline over a transport
    pub fn status_code(self) -> u16 {
        match self {
            Self::Client => 400,
            Self::Server => 500,
        }
    }
}

/// Equity analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Required input missing or blank
    #[error("{0}")]
    Validation(String),

    /// Stage record missing, expired, or incomplete
    #[error("{0}")]
    Sequencing(String),

    /// An external collaborator call failed
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: CollaboratorKind,
        message: String,
    },

    /// API request failed
    #[error("API error: {0}")]
    Api(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinance(String),

    /// Prompt template error
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stage store error
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    /// Attribute a failure to a collaborator, keeping its message intact.
    ///
    /// Errors that are already attributed pass through unchanged.
    pub fn from_collaborator(collaborator: CollaboratorKind, err: AnalysisError) -> Self {
        match err {
            attributed @ Self::Collaborator { .. } => attributed,
            other => Self::Collaborator {
                collaborator,
                message: other.to_string(),
            },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::Sequencing(_) => ErrorClass::Client,
            _ => ErrorClass::Server,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.class() == ErrorClass::Client
    }
}
