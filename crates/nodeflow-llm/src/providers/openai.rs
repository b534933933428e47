use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use nodeflow_core::config::TransformConfig;
use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::TextCleaner;

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that cleans and formats data to make it more readable for humans.";
const USER_PROMPT_PREFIX: &str = "Clean the following data to make it easier for a human to read: ";

/// Cleans node data through an OpenAI-compatible chat completions endpoint.
pub struct OpenAiCleaner {
    http: Client,
    config: TransformConfig,
}

impl OpenAiCleaner {
    pub fn new(config: TransformConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, config }
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Strings go to the model as-is; everything else is pretty-printed JSON.
pub(crate) fn data_to_text(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Pull `error.message` out of an error body, if there is one.
fn provider_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

impl TextCleaner for OpenAiCleaner {
    fn clean(&self, data: &Value) -> BoxFuture<'_, Result<String>> {
        let text = data_to_text(data);

        Box::pin(async move {
            let api_key = self
                .config
                .resolved_api_key()
                .ok_or_else(|| NodeflowError::MissingCredential {
                    provider: "OpenAI".to_string(),
                })?;

            let request = ChatRequest {
                model: &self.config.model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: SYSTEM_PROMPT.to_string(),
                    },
                    ChatMessage {
                        role: "user",
                        content: format!("{}{}", USER_PROMPT_PREFIX, text),
                    },
                ],
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            };

            debug!(model = %self.config.model, chars = text.len(), "Sending transform request");

            let response = self
                .http
                .post(&self.config.base_url)
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| NodeflowError::HttpRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), "Transform service returned an error");
                let message =
                    provider_error_message(&body).unwrap_or_else(|| "Unknown error".to_string());
                return Err(NodeflowError::Transform(format!("OpenAI API error: {}", message)));
            }

            let parsed: ChatResponse = response.json().await.map_err(|e| {
                NodeflowError::Transform(format!("Failed to parse OpenAI response: {}", e))
            })?;

            parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content.unwrap_or_default())
                .ok_or_else(|| {
                    NodeflowError::Transform("OpenAI response contained no choices".to_string())
                })
        })
    }
}
