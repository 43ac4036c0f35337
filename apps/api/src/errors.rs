use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::ProviderId;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Provider errors always name the provider that produced them; the pipeline
/// never falls back to a different provider on failure.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Document format error: {0}")]
    DocumentFormat(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String, hint: String },

    #[error("{provider} rejected the credential: {message}")]
    ProviderAuth { provider: ProviderId, message: String },

    #[error("{provider} did not respond within {timeout_ms}ms")]
    ProviderTimeout { provider: ProviderId, timeout_ms: u64 },

    #[error("{provider} is unavailable: {reason}")]
    ProviderUnavailable { provider: ProviderId, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for the errors a provider call can raise; used by the résumé path
    /// to degrade to a "no suggestions" document instead of failing.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            AppError::ProviderAuth { .. }
                | AppError::ProviderTimeout { .. }
                | AppError::ProviderUnavailable { .. }
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut hint: Option<String> = None;
        let mut provider: Option<ProviderId> = None;

        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::DocumentFormat(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "DOCUMENT_FORMAT_ERROR",
                msg.clone(),
            ),
            AppError::Configuration { message, hint: h } => {
                hint = Some(h.clone());
                (
                    StatusCode::PRECONDITION_FAILED,
                    "CONFIGURATION_ERROR",
                    message.clone(),
                )
            }
            AppError::ProviderAuth { provider: p, .. } => {
                provider = Some(*p);
                (
                    StatusCode::UNAUTHORIZED,
                    "PROVIDER_AUTH_ERROR",
                    self.to_string(),
                )
            }
            AppError::ProviderTimeout { provider: p, .. } => {
                provider = Some(*p);
                tracing::warn!("{self}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "PROVIDER_TIMEOUT",
                    self.to_string(),
                )
            }
            AppError::ProviderUnavailable { provider: p, .. } => {
                provider = Some(*p);
                tracing::warn!("{self}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PROVIDER_UNAVAILABLE",
                    self.to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "The document could not be stored".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(hint) = hint {
            error["hint"] = json!(hint);
        }
        if let Some(provider) = provider {
            error["provider"] = json!(provider);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
