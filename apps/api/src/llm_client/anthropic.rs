//! Anthropic Messages API backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    error_for_status, join_url, require_credential, Availability, LlmError, ProviderId,
    TextProvider,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
];
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    /// Extracts the text content from the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    endpoint: String,
}

impl AnthropicClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TextProvider for AnthropicClient {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn complete(
        &self,
        http: &Client,
        prompt: &str,
        model: &str,
        credential: Option<&str>,
    ) -> Result<String, LlmError> {
        let api_key = require_credential(credential)?;
        let response = http
            .post(join_url(&self.endpoint, "v1/messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&MessagesRequest {
                model,
                max_tokens: MAX_TOKENS,
                messages: vec![AnthropicMessage {
                    role: "user",
                    content: prompt,
                }],
            })
            .send()
            .await?;

        let body: MessagesResponse = error_for_status(response).await?.json().await?;
        if let Some(usage) = &body.usage {
            debug!(
                "Anthropic usage: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }
        Ok(body.text().unwrap_or_default().to_string())
    }

    async fn probe(
        &self,
        http: &Client,
        model: &str,
        credential: Option<&str>,
    ) -> Result<Availability, LlmError> {
        let api_key = require_credential(credential)?;
        let response = http
            .get(join_url(&self.endpoint, &format!("v1/models/{model}")))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(Availability::ok())
    }
}
