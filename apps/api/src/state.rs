use std::sync::Arc;

use crate::config::Config;
use crate::settings::ProviderRegistry;
use crate::storage::ArtifactStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Provider settings and client factory. Snapshotted once per request.
    pub registry: Arc<ProviderRegistry>,
    pub store: ArtifactStore,
}
