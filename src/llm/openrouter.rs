//! OpenRouter chat-completions client.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{DecisionRequest, DecisionResponse, DecisionService, LlmError};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Decision service backed by OpenRouter.
///
/// Each channel may be routed to its own model; unknown channels use the
/// default model.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    default_model: String,
    channel_models: HashMap<String, String>,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            default_model,
            channel_models: HashMap::new(),
            endpoint: OPENROUTER_URL.to_string(),
        }
    }

    /// Route `channel` to `model` instead of the default.
    pub fn with_channel_model(mut self, channel: impl Into<String>, model: impl Into<String>) -> Self {
        self.channel_models.insert(channel.into(), model.into());
        self
    }

    /// Override the completions endpoint (self-hosted gateways, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn model_for(&self, channel: &str) -> &str {
        self.channel_models
            .get(channel)
            .map(String::as_str)
            .unwrap_or(self.default_model.as_str())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
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
    content: Option<String>,
}

#[async_trait]
impl DecisionService for OpenRouterClient {
    async fn generate(&self, request: DecisionRequest) -> Result<DecisionResponse, LlmError> {
        let model = self.model_for(&request.channel);
        tracing::debug!("Decision request on channel {} via {}", request.channel, model);

        let mut content = vec![ContentPart::Text {
            text: request.input,
        }];
        if let Some(reference) = &request.image {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image_url_for(reference).await?,
                },
            });
        }

        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = api_error_message(&text);
            tracing::error!("Decision service error ({}): {}", status, message);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let output = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        Ok(DecisionResponse { output })
    }
}

/// Turn a screenshot reference into something the API accepts: data URIs
/// and URLs pass through, file paths are inlined as base64 PNG.
async fn image_url_for(reference: &str) -> Result<String, LlmError> {
    if reference.starts_with("data:") || reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(reference.to_string());
    }
    let bytes = tokio::fs::read(reference)
        .await
        .map_err(|source| LlmError::Image {
            reference: reference.to_string(),
            source,
        })?;
    Ok(format!("data:image/png;base64,{}", B64.encode(bytes)))
}

/// Pull `error.message` out of an API error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "Unknown API error".to_string()
            } else {
                body.to_string()
            }
        })
}
