//! Concrete clients for the pipeline's external services

pub mod finnhub;
pub mod openai;
pub mod reddit;
pub mod yahoo;

pub use finnhub::FinnhubNewsProvider;
pub use openai::OpenAiTextGenerator;
pub use reddit::{NeutralScorer, PolarityScorer, RedditSocialProvider};
pub use yahoo::YahooPriceProvider;
