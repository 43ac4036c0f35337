use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use arc_swap::ArcSwap;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::{Config, ProviderTimeouts};
use crate::errors::AppError;
use crate::llm_client::{credential_hint, Backend, ProviderClient, ProviderId};
use crate::settings::{
    Credential, CredentialSource, ProviderConfig, ProviderEntry, ProviderOverride,
    ProviderSettings, ProviderStatus, ProviderView, SettingsUpdate, SettingsView,
};
use crate::storage::write_atomic;

/// Endpoints and credentials from the environment. They sit underneath the
/// stored settings and are never written to the settings file.
#[derive(Debug, Clone)]
pub struct EnvFallbacks {
    pub endpoints: BTreeMap<ProviderId, String>,
    pub credentials: BTreeMap<ProviderId, Credential>,
}

impl Default for EnvFallbacks {
    fn default() -> Self {
        Self {
            endpoints: ProviderId::ALL
                .into_iter()
                .map(|id| (id, id.default_endpoint().to_string()))
                .collect(),
            credentials: BTreeMap::new(),
        }
    }
}

impl EnvFallbacks {
    pub fn from_config(config: &Config) -> Self {
        let mut fallbacks = Self::default();
        for id in ProviderId::ALL {
            fallbacks.endpoints.insert(id, config.endpoint(id).to_string());
            if let Some(key) = config.env_credential(id) {
                fallbacks.credentials.insert(id, key.clone());
            }
        }
        fallbacks
    }

    pub fn with_endpoint(mut self, provider: ProviderId, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(provider, endpoint.into());
        self
    }

    pub fn with_credential(mut self, provider: ProviderId, key: Credential) -> Self {
        self.credentials.insert(provider, key);
        self
    }
}

/// Process-wide provider state, owned by `AppState`.
///
/// Readers take a lock-free snapshot (`ArcSwap::load_full`) once per request.
/// Writers are serialized by `write_lock`, persist first, then publish a new
/// snapshot with `version + 1`, so an in-flight request keeps the snapshot it
/// started with.
pub struct ProviderRegistry {
    current: ArcSwap<ProviderSettings>,
    write_lock: Mutex<()>,
    fallbacks: EnvFallbacks,
    settings_path: Option<PathBuf>,
    http: Client,
    timeouts: ProviderTimeouts,
}

impl ProviderRegistry {
    pub fn new(
        settings: ProviderSettings,
        fallbacks: EnvFallbacks,
        settings_path: Option<PathBuf>,
        http: Client,
        timeouts: ProviderTimeouts,
    ) -> Self {
        Self {
            current: ArcSwap::from_pointee(settings.with_all_providers()),
            write_lock: Mutex::new(()),
            fallbacks,
            settings_path,
            http,
            timeouts,
        }
    }

    /// Startup constructor: stored settings from `config.settings_path`,
    /// fallbacks from the environment.
    pub fn from_config(config: &Config, http: Client) -> anyhow::Result<Self> {
        let settings = load_settings(&config.settings_path)?;
        info!(
            "Provider settings loaded (version {}, active provider: {})",
            settings.version, settings.active
        );
        Ok(Self::new(
            settings,
            EnvFallbacks::from_config(config),
            Some(config.settings_path.clone()),
            http,
            config.timeouts,
        ))
    }

    pub fn snapshot(&self) -> Arc<ProviderSettings> {
        self.current.load_full()
    }

    /// Resolves the configuration for one request from the current snapshot.
    ///
    /// Credential precedence: request override, then stored setting, then
    /// environment. A hosted provider with none of the three is a
    /// configuration error.
    pub fn get_active_config(
        &self,
        request: Option<&ProviderOverride>,
    ) -> Result<ProviderConfig, AppError> {
        let snapshot = self.snapshot();
        let provider = request
            .and_then(|o| o.provider)
            .unwrap_or(snapshot.active);

        if let Some(model) = request.and_then(|o| o.model.as_deref()) {
            validate_model(provider, model)?;
        }

        let config = self.resolve(&snapshot, provider, request);
        if provider.requires_credential() && config.credential.is_none() {
            return Err(AppError::Configuration {
                message: format!("No API key configured for {}", provider.display_name()),
                hint: credential_hint(provider),
            });
        }
        Ok(config)
    }

    /// Applies a partial update. Validation failures and persistence failures
    /// leave the current snapshot untouched.
    pub async fn update(&self, update: SettingsUpdate) -> Result<SettingsView, AppError> {
        let _guard = self.write_lock.lock().await;
        let current = self.snapshot();
        let provider = update.provider_id.unwrap_or(current.active);

        let mut next = (*current).clone();
        next.version = current.version + 1;
        next.active = provider;
        let entry = next
            .providers
            .entry(provider)
            .or_insert_with(|| ProviderEntry::default_for(provider));

        if let Some(model) = update.model_name.as_deref() {
            let model = model.trim();
            validate_model(provider, model)?;
            entry.model_name = model.to_string();
        }

        match (update.credential, update.clear_credential) {
            (Some(_), true) => {
                return Err(AppError::Validation(
                    "Supply either credential or clearCredential, not both".to_string(),
                ))
            }
            (Some(key), false) => {
                let key = Credential::new(key.expose().trim());
                key.validate_for(provider).map_err(AppError::Validation)?;
                entry.credential = Some(key);
            }
            (None, true) => entry.credential = None,
            (None, false) => {}
        }

        if let Some(endpoint) = update.endpoint.as_deref() {
            let endpoint = endpoint.trim();
            entry.endpoint = if endpoint.is_empty() {
                None
            } else {
                validate_endpoint(endpoint)?;
                Some(endpoint.trim_end_matches('/').to_string())
            };
        }

        if let Some(path) = &self.settings_path {
            persist(path.clone(), &next).await?;
        }

        info!(
            "Provider settings updated to version {}: active={}, model={}",
            next.version,
            next.active,
            next.entry(next.active).model_name
        );
        self.current.store(Arc::new(next));
        Ok(self.view())
    }

    /// Redacted read-back of the current snapshot.
    pub fn view(&self) -> SettingsView {
        let snapshot = self.snapshot();
        let providers: Vec<ProviderView> = ProviderId::ALL
            .into_iter()
            .map(|id| self.provider_view(&snapshot, id))
            .collect();
        SettingsView {
            version: snapshot.version,
            active: self.provider_view(&snapshot, snapshot.active),
            providers,
        }
    }

    /// A client bound to the provider, endpoint and timeouts in `config`.
    pub fn client_for(&self, config: &ProviderConfig) -> ProviderClient {
        ProviderClient::new(
            Backend::for_provider(config.provider_id, &config.endpoint),
            self.http.clone(),
            self.timeouts.call_options(config.provider_id),
        )
    }

    /// Probes `provider` (default: the active one). A missing credential is
    /// reported in the result rather than raised.
    pub async fn check_availability(&self, provider: Option<ProviderId>) -> ProviderStatus {
        let snapshot = self.snapshot();
        let provider = provider.unwrap_or(snapshot.active);
        let config = self.resolve(&snapshot, provider, None);
        drop(snapshot);

        let availability = self
            .client_for(&config)
            .check_availability(&config.model_name, config.credential())
            .await;
        if !availability.available {
            info!(
                "{provider} probe: unavailable ({:?})",
                availability.reason
            );
        }

        ProviderStatus {
            provider_id: provider,
            model_name: config.model_name,
            availability,
        }
    }

    fn resolve(
        &self,
        snapshot: &ProviderSettings,
        provider: ProviderId,
        request: Option<&ProviderOverride>,
    ) -> ProviderConfig {
        let entry = snapshot.entry(provider);
        let (credential, credential_source) = match (
            request.and_then(|o| o.credential.clone()),
            entry.credential.clone(),
            self.fallbacks.credentials.get(&provider).cloned(),
        ) {
            _ if !provider.requires_credential() => (None, None),
            (Some(key), _, _) => (Some(key), Some(CredentialSource::Request)),
            (None, Some(key), _) => (Some(key), Some(CredentialSource::Stored)),
            (None, None, Some(key)) => (Some(key), Some(CredentialSource::Environment)),
            (None, None, None) => (None, None),
        };

        ProviderConfig {
            provider_id: provider,
            model_name: request
                .and_then(|o| o.model.clone())
                .unwrap_or(entry.model_name),
            credential,
            credential_source,
            endpoint: entry.endpoint.unwrap_or_else(|| self.fallback_endpoint(provider)),
            settings_version: snapshot.version,
        }
    }

    fn fallback_endpoint(&self, provider: ProviderId) -> String {
        self.fallbacks
            .endpoints
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| provider.default_endpoint().to_string())
    }

    fn provider_view(&self, snapshot: &ProviderSettings, provider: ProviderId) -> ProviderView {
        let config = self.resolve(snapshot, provider, None);
        ProviderView {
            provider_id: provider,
            model_name: config.model_name,
            credential_present: config.credential.is_some(),
            credential_hint: config.credential.as_ref().map(Credential::redacted),
            credential_source: config.credential_source,
            endpoint: config.endpoint,
            supported_models: provider.supported_models(),
        }
    }
}

/// Reads the settings file. Missing file: defaults. Malformed file: error.
pub fn load_settings(path: &Path) -> anyhow::Result<ProviderSettings> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No settings file at {}; using defaults", path.display());
            return Ok(ProviderSettings::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read settings file {}", path.display()))
        }
    };
    let settings: ProviderSettings = serde_json::from_str(&raw)
        .with_context(|| format!("Settings file {} is malformed", path.display()))?;
    Ok(settings.with_all_providers())
}

async fn persist(path: PathBuf, settings: &ProviderSettings) -> Result<(), AppError> {
    let bytes = serde_json::to_vec_pretty(settings)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to serialize settings: {e}")))?;
    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("settings write task failed: {e}")))??;
    Ok(())
}

fn validate_model(provider: ProviderId, model: &str) -> Result<(), AppError> {
    if model.trim().is_empty() {
        return Err(AppError::Validation("modelName cannot be empty".to_string()));
    }
    match provider.supported_models() {
        Some(models) if !models.contains(&model) => Err(AppError::Validation(format!(
            "Model '{model}' is not supported by {}. Supported: {}",
            provider.display_name(),
            models.join(", ")
        ))),
        _ => Ok(()),
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), AppError> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| AppError::Validation(format!("Invalid endpoint '{endpoint}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "Endpoint '{endpoint}' must use http or https"
        )));
    }
    Ok(())
}
