//! OpenAI Chat Completions backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    error_for_status, join_url, require_credential, Availability, LlmError, ProviderId,
    TextProvider,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"];

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
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
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TextProvider for OpenAiClient {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
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
            .post(join_url(&self.endpoint, "v1/chat/completions"))
            .bearer_auth(api_key)
            .json(&ChatRequest {
                model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
            })
            .send()
            .await?;

        let body: ChatResponse = error_for_status(response).await?.json().await?;
        Ok(body.into_text())
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
            .bearer_auth(api_key)
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(Availability::ok())
    }
}
