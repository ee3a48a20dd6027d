//! # Completion Provider
//!
//! Text generation service producing JSON that conforms to a caller supplied schema.
//!
//! ## OpenAI
//!
//! The production provider calls the Chat Completions endpoint with structured outputs:
//! - The prompt goes in as a single system message
//! - `response_format` is `json_schema` in strict mode, so every property is required
//!   and no extra properties are allowed
//! - The reply is `choices[0].message.content`, a JSON string, or `refusal` when the
//!   model declined
//!
//! No retries. The HTTP client carries a timeout so a stuck call cannot hold a request forever.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::AUTHORIZATION};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::CompletionError;

/// Named JSON schema the output must conform to.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: Value,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, schema: &ResponseSchema)
    -> Result<Value, CompletionError>;
}

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
    refusal: Option<String>,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn request_body(&self, prompt: &str, schema: &ResponseSchema) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "strict": true,
                    "schema": schema.schema,
                }
            }
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Value, CompletionError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&self.request_body(prompt, schema))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let completion: ChatCompletion = response.json().await?;
        debug!("Completion returned {} choices", completion.choices.len());

        parse_message(completion)
    }
}

fn parse_message(completion: ChatCompletion) -> Result<Value, CompletionError> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or(CompletionError::Empty)?;

    if let Some(refusal) = message.refusal {
        return Err(CompletionError::Refusal(refusal));
    }

    let content = message.content.ok_or(CompletionError::Empty)?;
    Ok(serde_json::from_str(&content)?)
}
