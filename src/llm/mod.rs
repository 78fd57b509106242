//! Decision service abstraction.
//!
//! The agent treats the model as a stateless text-completion endpoint: one
//! request in, one string out. Everything the model needs to know about
//! earlier steps travels inside the request.

mod openrouter;

pub use openrouter::OpenRouterClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("no content in model response")]
    EmptyResponse,

    #[error("could not attach image {reference}: {source}")]
    Image {
        reference: String,
        #[source]
        source: std::io::Error,
    },
}

/// One call to the decision service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Routing key naming the purpose of the call.
    pub channel: String,
    /// Full prompt text.
    pub input: String,
    /// Screenshot reference for multimodal backends. Text-only backends
    /// ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub output: String,
}

/// Opaque text-completion endpoint. No retries are expected of
/// implementations; a failure is reported once.
#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn generate(&self, request: DecisionRequest) -> Result<DecisionResponse, LlmError>;
}
