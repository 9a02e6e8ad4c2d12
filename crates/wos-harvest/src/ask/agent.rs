//! Hosted language model answering questions over prepared context.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::LlmConfig;
use crate::error::AskError;

/// Instructions sent with every question.
const SYSTEM_PROMPT: &str = "You answer questions about a table of Web of Science publications, \
one row per (publication, author). Use only the statistics in the context. Publication counts \
are over distinct UIDs. If the context cannot answer the question, say so. Answer in the \
language of the question.";

/// Low temperature for factual answers.
const TEMPERATURE: f32 = 0.1;

/// Answers a question given table context.
#[async_trait]
pub trait AnswerAgent: Send + Sync {
    async fn answer(&self, question: &str, context: &str) -> Result<String, AskError>;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct ChatCompletionAgent {
    client: Client,
    config: LlmConfig,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionAgent {
    /// Create an agent for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self, AskError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl AnswerAgent for ChatCompletionAgent {
    async fn answer(&self, question: &str, context: &str) -> Result<String, AskError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("Context:\n{context}\n\nQuestion: {question}")}
            ],
            "temperature": TEMPERATURE,
        });

        tracing::debug!(model = %self.config.model, "Sending question to model");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AskError::Status { status: status.as_u16(), message });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(AskError::EmptyAnswer)
    }
}

impl std::fmt::Debug for ChatCompletionAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionAgent").field("config", &self.config).finish_non_exhaustive()
    }
}
