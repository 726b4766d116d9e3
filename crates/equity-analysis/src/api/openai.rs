//! OpenAI-compatible chat-completions backend for narrative generation

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::providers::TextGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Text generator backed by any OpenAI-compatible `/chat/completions` API
pub struct OpenAiTextGenerator {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    max_tokens: usize,
}

impl OpenAiTextGenerator {
    pub fn new(client: Client, config: &AnalysisConfig) -> Self {
        Self {
            client,
            api_base: config.openai_api_base.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model, api_base = %self.api_base))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(prompt_chars = prompt.len(), "Requesting narrative");

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Content-Type", "application/json")
            .json(&self.request(prompt));
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(AnalysisError::Api(match status.as_u16() {
                401 => "Authentication failed".to_string(),
                429 => format!("Rate limit exceeded: {error_text}"),
                400 => format!("Invalid request: {error_text}"),
                404 => format!("Model not found: {}", self.model),
                _ => format!("HTTP {status}: {error_text}"),
            }));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Api(format!("Failed to parse response: {e}")))?;
        extract_content(body)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn extract_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AnalysisError::Api("No content in response".to_string()))
}
