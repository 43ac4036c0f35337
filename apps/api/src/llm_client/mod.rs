//! LLM Client: the single point of entry for all text-generation calls in Tailor.
//!
//! ARCHITECTURAL RULE: No other module may call a provider API directly.
//! All LLM interactions MUST go through [`ProviderClient`].
//!
//! Each backend (local Ollama, OpenAI, Anthropic) lives in its own submodule and
//! implements [`TextProvider`] for a single attempt. Timeouts, retries and
//! error attribution are applied once, here, for every backend.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AppError;

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod prompts;

/// A failed generation is retried at most once, and only for transient errors.
const MAX_RETRIES: u32 = 1;
/// Availability probes never wait longer than this, whatever the configuration says.
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ────────────────────────────────────────────────────────────────────────────
// Provider identity
// ────────────────────────────────────────────────────────────────────────────

/// The closed set of supported providers. New backends are added here as a
/// variant, never by string matching elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Local, ProviderId::OpenAi, ProviderId::Anthropic];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Local => "local",
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Local => "Ollama",
            ProviderId::OpenAi => "OpenAI",
            ProviderId::Anthropic => "Anthropic",
        }
    }

    /// Hosted providers need an API key; the local inference service does not.
    pub fn requires_credential(&self) -> bool {
        !matches!(self, ProviderId::Local)
    }

    /// `None` means any model name is accepted (locally installed models vary).
    pub fn supported_models(&self) -> Option<&'static [&'static str]> {
        match self {
            ProviderId::Local => None,
            ProviderId::OpenAi => Some(openai::MODELS),
            ProviderId::Anthropic => Some(anthropic::MODELS),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::Local => ollama::DEFAULT_MODEL,
            ProviderId::OpenAi => openai::DEFAULT_MODEL,
            ProviderId::Anthropic => anthropic::DEFAULT_MODEL,
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderId::Local => ollama::DEFAULT_ENDPOINT,
            ProviderId::OpenAi => openai::DEFAULT_ENDPOINT,
            ProviderId::Anthropic => anthropic::DEFAULT_ENDPOINT,
        }
    }

    /// Environment variable that supplies the fallback credential.
    pub fn credential_env_var(&self) -> Option<&'static str> {
        match self {
            ProviderId::Local => None,
            ProviderId::OpenAi => Some("OPENAI_API_KEY"),
            ProviderId::Anthropic => Some("ANTHROPIC_API_KEY"),
        }
    }

    /// Prefix every well-formed key for this provider starts with.
    pub fn credential_prefix(&self) -> Option<&'static str> {
        match self {
            ProviderId::Local => None,
            ProviderId::OpenAi => Some("sk-"),
            ProviderId::Anthropic => Some("sk-ant-"),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "ollama" => Ok(ProviderId::Local),
            "openai" => Ok(ProviderId::OpenAi),
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            other => Err(AppError::Validation(format!(
                "Unknown provider '{other}'. Expected one of: local, openai, anthropic"
            ))),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors and probe results
// ────────────────────────────────────────────────────────────────────────────

/// Errors raised by a single attempt against a provider backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("credential rejected (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("no API key configured")]
    MissingCredential,
}

impl LlmError {
    /// Connection failures, rate limits and server errors may succeed on retry.
    fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(e) => !e.is_timeout() && (e.is_connect() || e.is_request()),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    fn into_app_error(self, provider: ProviderId, timeout: Duration) -> AppError {
        match self {
            LlmError::Http(e) if e.is_timeout() => AppError::ProviderTimeout {
                provider,
                timeout_ms: timeout.as_millis() as u64,
            },
            LlmError::Auth { message, .. } => AppError::ProviderAuth { provider, message },
            LlmError::MissingCredential => AppError::Configuration {
                message: format!("No API key configured for {}", provider.display_name()),
                hint: credential_hint(provider),
            },
            other => AppError::ProviderUnavailable {
                provider,
                reason: other.to_string(),
            },
        }
    }

    fn into_availability(self) -> Availability {
        match self {
            LlmError::Auth { message, .. } => Availability::unavailable(UnavailableReason::Auth, message),
            LlmError::MissingCredential => Availability::unavailable(
                UnavailableReason::MissingCredential,
                "no API key configured",
            ),
            LlmError::Http(e) if e.is_timeout() => {
                Availability::unavailable(UnavailableReason::Timeout, e.to_string())
            }
            LlmError::Http(e) => Availability::unavailable(UnavailableReason::Unreachable, e.to_string()),
            LlmError::Api { status: 404, message } => {
                Availability::unavailable(UnavailableReason::ModelNotFound, message)
            }
            other => Availability::unavailable(UnavailableReason::Unexpected, other.to_string()),
        }
    }
}

/// Remediation text shown to users when a hosted provider has no key.
pub fn credential_hint(provider: ProviderId) -> String {
    match provider.credential_env_var() {
        Some(var) => format!(
            "Save an API key for {} via PUT /api/v1/settings or set {var} in the environment",
            provider.display_name()
        ),
        None => "The local provider needs no credential".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    Auth,
    Timeout,
    Unreachable,
    ModelNotFound,
    MissingCredential,
    Unexpected,
}

/// Result of an availability probe. Probes never fail; they report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Availability {
    pub fn ok() -> Self {
        Self {
            available: true,
            reason: None,
            detail: None,
        }
    }

    pub fn unavailable(reason: UnavailableReason, detail: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason),
            detail: Some(detail.into()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Backend contract
// ────────────────────────────────────────────────────────────────────────────

/// One provider backend. Implementations perform exactly one HTTP attempt per
/// call and never sleep or retry; [`ProviderClient`] owns that policy.
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Sends `prompt` to `model` and returns the generated text.
    async fn complete(
        &self,
        http: &Client,
        prompt: &str,
        model: &str,
        credential: Option<&str>,
    ) -> Result<String, LlmError>;

    /// Cheap, side-effect-free call that tells whether `model` is usable.
    async fn probe(
        &self,
        http: &Client,
        model: &str,
        credential: Option<&str>,
    ) -> Result<Availability, LlmError>;
}

/// Timeouts and retry pacing applied to one provider.
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    pub timeout: Duration,
    pub probe_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            probe_timeout: MAX_PROBE_TIMEOUT,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// The tagged set of concrete backends.
#[derive(Debug, Clone)]
pub enum Backend {
    Local(ollama::OllamaClient),
    OpenAi(openai::OpenAiClient),
    Anthropic(anthropic::AnthropicClient),
}

impl Backend {
    pub fn for_provider(provider: ProviderId, endpoint: &str) -> Self {
        match provider {
            ProviderId::Local => Backend::Local(ollama::OllamaClient::new(endpoint)),
            ProviderId::OpenAi => Backend::OpenAi(openai::OpenAiClient::new(endpoint)),
            ProviderId::Anthropic => Backend::Anthropic(anthropic::AnthropicClient::new(endpoint)),
        }
    }
}

#[async_trait]
impl TextProvider for Backend {
    fn id(&self) -> ProviderId {
        match self {
            Backend::Local(c) => c.id(),
            Backend::OpenAi(c) => c.id(),
            Backend::Anthropic(c) => c.id(),
        }
    }

    async fn complete(
        &self,
        http: &Client,
        prompt: &str,
        model: &str,
        credential: Option<&str>,
    ) -> Result<String, LlmError> {
        match self {
            Backend::Local(c) => c.complete(http, prompt, model, credential).await,
            Backend::OpenAi(c) => c.complete(http, prompt, model, credential).await,
            Backend::Anthropic(c) => c.complete(http, prompt, model, credential).await,
        }
    }

    async fn probe(
        &self,
        http: &Client,
        model: &str,
        credential: Option<&str>,
    ) -> Result<Availability, LlmError> {
        match self {
            Backend::Local(c) => c.probe(http, model, credential).await,
            Backend::OpenAi(c) => c.probe(http, model, credential).await,
            Backend::Anthropic(c) => c.probe(http, model, credential).await,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client with timeout / retry policy
// ────────────────────────────────────────────────────────────────────────────

/// Stateless handle used by the pipeline. Cheap to clone; safe to share.
///
/// Dropping a pending `generate` future (for example when the HTTP caller
/// disconnects) drops the in-flight request with it.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    backend: Backend,
    http: Client,
    options: CallOptions,
}

impl ProviderClient {
    pub fn new(backend: Backend, http: Client, options: CallOptions) -> Self {
        Self {
            backend,
            http,
            options,
        }
    }

    pub fn id(&self) -> ProviderId {
        self.backend.id()
    }

    /// Generates text, bounded by the configured timeout.
    ///
    /// - timeout → `ProviderTimeout`, not retried
    /// - rejected credential → `ProviderAuth`, not retried
    /// - transient failure → retried once after `retry_backoff`, then `ProviderUnavailable`
    pub async fn generate(
        &self,
        prompt: &str,
        model: &str,
        credential: Option<&str>,
    ) -> Result<String, AppError> {
        let provider = self.id();
        let timeout = self.options.timeout;
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                warn!(
                    "{provider} call attempt {} failed, retrying after {}ms...",
                    attempt,
                    self.options.retry_backoff.as_millis()
                );
                tokio::time::sleep(self.options.retry_backoff).await;
            }

            let call = self.backend.complete(&self.http, prompt, model, credential);
            match tokio::time::timeout(timeout, call).await {
                Err(_) => {
                    return Err(AppError::ProviderTimeout {
                        provider,
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
                Ok(Ok(text)) => {
                    debug!(
                        "{provider} generation succeeded: model={model}, chars={}",
                        text.len()
                    );
                    return Ok(text);
                }
                Ok(Err(e)) if e.is_transient() => {
                    warn!("{provider} transient failure: {e}");
                    last_error = Some(e);
                }
                Ok(Err(e)) => return Err(e.into_app_error(provider, timeout)),
            }
        }

        Err(AppError::ProviderUnavailable {
            provider,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no response".to_string()),
        })
    }

    /// Probes the provider. Never fails: every outcome is a structured
    /// [`Availability`]. A probe that times out is retried once.
    pub async fn check_availability(&self, model: &str, credential: Option<&str>) -> Availability {
        let provider = self.id();
        if provider.requires_credential() && credential.map_or(true, |c| c.trim().is_empty()) {
            return LlmError::MissingCredential.into_availability();
        }

        let probe_timeout = self.options.probe_timeout.min(MAX_PROBE_TIMEOUT);
        for attempt in 0..=MAX_RETRIES {
            let probe = self.backend.probe(&self.http, model, credential);
            match tokio::time::timeout(probe_timeout, probe).await {
                Ok(Ok(availability)) => return availability,
                Ok(Err(e)) => return e.into_availability(),
                Err(_) => debug!(
                    "{provider} probe attempt {} timed out after {}ms",
                    attempt + 1,
                    probe_timeout.as_millis()
                ),
            }
        }

        Availability::unavailable(
            UnavailableReason::Timeout,
            format!("no response within {}ms", probe_timeout.as_millis()),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared HTTP helpers
// ────────────────────────────────────────────────────────────────────────────

/// Turns a non-success response into the matching [`LlmError`].
async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body);
    if status.as_u16() == 401 || status.as_u16() == 403 {
        Err(LlmError::Auth {
            status: status.as_u16(),
            message,
        })
    } else {
        Err(LlmError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pulls a readable message out of the error shapes the providers use:
/// `{"error": {"message": ...}}` (OpenAI, Anthropic) or `{"error": "..."}` (Ollama).
fn extract_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        let error = v.get("error")?;
        error
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| error.as_str())
            .map(str::to_string)
    });
    message.unwrap_or_else(|| body.trim().to_string())
}

fn require_credential(credential: Option<&str>) -> Result<&str, LlmError> {
    match credential {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(LlmError::MissingCredential),
    }
}

fn join_url(endpoint: &str, path: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
}
