//! Local inference backend (Ollama). No credential; fixed local endpoint by default.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{error_for_status, join_url, Availability, LlmError, ProviderId, TextProvider, UnavailableReason};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5:14b";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
}

impl OllamaClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

/// Ollama lists models with an explicit tag; `llama3` is installed as `llama3:latest`.
fn is_installed(installed: &[ModelTag], model: &str) -> bool {
    installed
        .iter()
        .any(|tag| tag.name == model || tag.name.strip_suffix(":latest") == Some(model))
}

#[async_trait]
impl TextProvider for OllamaClient {
    fn id(&self) -> ProviderId {
        ProviderId::Local
    }

    async fn complete(
        &self,
        http: &Client,
        prompt: &str,
        model: &str,
        _credential: Option<&str>,
    ) -> Result<String, LlmError> {
        let response = http
            .post(join_url(&self.endpoint, "api/generate"))
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        let body: GenerateResponse = error_for_status(response).await?.json().await?;
        Ok(body.response)
    }

    async fn probe(
        &self,
        http: &Client,
        model: &str,
        _credential: Option<&str>,
    ) -> Result<Availability, LlmError> {
        let response = http.get(join_url(&self.endpoint, "api/tags")).send().await?;
        let tags: TagsResponse = error_for_status(response).await?.json().await?;

        if is_installed(&tags.models, model) {
            Ok(Availability::ok())
        } else {
            Ok(Availability::unavailable(
                UnavailableReason::ModelNotFound,
                format!("model '{model}' is not installed; run `ollama pull {model}`"),
            ))
        }
    }
}
