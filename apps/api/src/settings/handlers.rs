//! Axum route handlers for provider settings and availability.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::llm_client::ProviderId;
use crate::settings::{ProviderStatus, SettingsUpdate, SettingsView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub provider: Option<String>,
}

/// GET /api/v1/settings
///
/// Redacted view of the active provider and every configured provider.
pub async fn handle_get_settings(State(state): State<AppState>) -> Json<SettingsView> {
    Json(state.registry.view())
}

/// PUT /api/v1/settings
///
/// Partial update. Returns the new redacted view.
pub async fn handle_update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsView>, AppError> {
    Ok(Json(state.registry.update(update).await?))
}

/// GET /api/v1/providers/status?provider=
///
/// Probes the named provider (or the active one). Always 200: an unreachable
/// provider is reported in the body, not as an error status.
pub async fn handle_provider_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ProviderStatus>, AppError> {
    let provider = query
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::parse::<ProviderId>)
        .transpose()?;

    Ok(Json(state.registry.check_availability(provider).await))
}
