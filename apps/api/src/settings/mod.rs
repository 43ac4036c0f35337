//! Provider Registry & Settings Store.
//!
//! The active provider, per-provider model choice, stored credentials and
//! endpoints. Read by every request as an immutable snapshot; changed only
//! through [`ProviderRegistry::update`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::llm_client::{Availability, ProviderId};

pub mod handlers;
pub mod registry;

pub use registry::ProviderRegistry;

/// Minimum length of a plausible hosted API key.
pub const MIN_CREDENTIAL_LEN: usize = 20;

// ────────────────────────────────────────────────────────────────────────────
// Credential
// ────────────────────────────────────────────────────────────────────────────

/// An API key. `Debug` and read-back never show more than a redacted hint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext key, for the outbound request only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `sk-…wxyz` style hint: the key's prefix up to its first dash plus the
    /// last four characters. Short keys show only the tail.
    pub fn redacted(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() < 12 {
            let tail: String = chars[chars.len().saturating_sub(2)..].iter().collect();
            return format!("…{tail}");
        }
        let head_len = self.0.find('-').map(|i| i + 1).unwrap_or(0).min(3);
        let head: String = chars[..head_len].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}…{tail}")
    }

    /// Syntactic plausibility for `provider`; the key is not verified remotely.
    pub fn validate_for(&self, provider: ProviderId) -> Result<(), String> {
        let Some(prefix) = provider.credential_prefix() else {
            return Err(format!("{} does not use an API key", provider.display_name()));
        };
        let key = self.expose();
        if key.chars().any(char::is_whitespace) {
            return Err("API key must not contain whitespace".to_string());
        }
        if !key.starts_with(prefix) {
            return Err(format!(
                "{} API keys start with '{prefix}'",
                provider.display_name()
            ));
        }
        // `sk-ant-` keys also start with `sk-`; keep them out of the OpenAI slot.
        if provider == ProviderId::OpenAi && key.starts_with("sk-ant-") {
            return Err("This looks like an Anthropic key, not an OpenAI key".to_string());
        }
        if key.chars().count() < MIN_CREDENTIAL_LEN {
            return Err(format!(
                "API key is too short (expected at least {MIN_CREDENTIAL_LEN} characters)"
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.redacted())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stored settings
// ────────────────────────────────────────────────────────────────────────────

/// Stored state for one provider. `endpoint: None` means "use the
/// environment/default endpoint".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ProviderEntry {
    pub fn default_for(provider: ProviderId) -> Self {
        Self {
            model_name: provider.default_model().to_string(),
            credential: None,
            endpoint: None,
        }
    }
}

/// One immutable, versioned settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default)]
    pub version: u64,
    pub active: ProviderId,
    #[serde(default)]
    pub providers: BTreeMap<ProviderId, ProviderEntry>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            version: 0,
            active: ProviderId::Local,
            providers: BTreeMap::new(),
        }
        .with_all_providers()
    }
}

impl ProviderSettings {
    /// Fills in an entry for every provider missing from a loaded file.
    pub fn with_all_providers(mut self) -> Self {
        for id in ProviderId::ALL {
            self.providers
                .entry(id)
                .or_insert_with(|| ProviderEntry::default_for(id));
        }
        self
    }

    pub fn entry(&self, provider: ProviderId) -> ProviderEntry {
        self.providers
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderEntry::default_for(provider))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resolved configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Request,
    Stored,
    Environment,
}

/// Everything one provider call needs, resolved from a single snapshot.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_id: ProviderId,
    pub model_name: String,
    pub credential: Option<Credential>,
    pub credential_source: Option<CredentialSource>,
    pub endpoint: String,
    /// Version of the settings snapshot this was resolved from.
    pub settings_version: u64,
}

impl ProviderConfig {
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_ref().map(Credential::expose)
    }
}

/// Per-request selection. Never written back to the settings.
#[derive(Debug, Clone, Default)]
pub struct ProviderOverride {
    pub provider: Option<ProviderId>,
    pub model: Option<String>,
    pub credential: Option<Credential>,
}

impl ProviderOverride {
    /// Builds an override from optional raw form fields; blank values are ignored.
    pub fn from_fields(
        provider: Option<&str>,
        model: Option<&str>,
        credential: Option<&str>,
    ) -> Result<Self, crate::errors::AppError> {
        fn non_blank(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }
        Ok(Self {
            provider: non_blank(provider).map(str::parse).transpose()?,
            model: non_blank(model).map(str::to_string),
            credential: non_blank(credential).map(Credential::new),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Update and read-back shapes
// ────────────────────────────────────────────────────────────────────────────

/// Partial settings update; only supplied fields change.
///
/// `providerId` both selects the entry the other fields apply to and makes
/// that provider the active one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub provider_id: Option<ProviderId>,
    pub model_name: Option<String>,
    pub credential: Option<Credential>,
    pub endpoint: Option<String>,
    #[serde(default)]
    pub clear_credential: bool,
}

/// Redacted read-back for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderView {
    pub provider_id: ProviderId,
    pub model_name: String,
    pub credential_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_source: Option<CredentialSource>,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_models: Option<&'static [&'static str]>,
}

/// `GET /api/v1/settings`: the active provider at top level plus every provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub version: u64,
    #[serde(flatten)]
    pub active: ProviderView,
    pub providers: Vec<ProviderView>,
}

/// `GET /api/v1/providers/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub provider_id: ProviderId,
    pub model_name: String,
    #[serde(flatten)]
    pub availability: Availability,
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAI_KEY: &str = "sk-proj-abcdefghijklmnopwxyz";

    #[test]
    fn test_redacted_hint_hides_plaintext() {
        let key = Credential::new(OPENAI_KEY);
        assert_eq!(key.redacted(), "sk-…wxyz");
        assert!(!format!("{key:?}").contains("abcdefghijklmnop"));
    }

    #[test]
    fn test_short_key_redaction_shows_tail_only() {
        assert_eq!(Credential::new("abcdef").redacted(), "…ef");
    }

    #[test]
    fn test_credential_plausibility() {
        assert!(Credential::new(OPENAI_KEY).validate_for(ProviderId::OpenAi).is_ok());
        assert!(Credential::new("sk-ant-REDACTED")
            .validate_for(ProviderId::Anthropic)
            .is_ok());

        assert!(Credential::new("sk-short").validate_for(ProviderId::OpenAi).is_err());
        assert!(Credential::new("pk-abcdefghijklmnopqrstuvwxyz")
            .validate_for(ProviderId::OpenAi)
            .is_err());
        assert!(Credential::new("sk-abc defghijklmnopqrstuvwxyz")
            .validate_for(ProviderId::OpenAi)
            .is_err());
        assert!(Credential::new(OPENAI_KEY).validate_for(ProviderId::Anthropic).is_err());
        assert!(Credential::new("sk-ant-REDACTED")
            .validate_for(ProviderId::OpenAi)
            .is_err());
        assert!(Credential::new(OPENAI_KEY).validate_for(ProviderId::Local).is_err());
    }

    #[test]
    fn test_settings_file_with_missing_providers_is_completed() {
        let raw = r#"{"active":"openai","providers":{"openai":{"modelName":"gpt-4o"}}}"#;
        let settings: ProviderSettings = serde_json::from_str(raw).unwrap();
        let settings = settings.with_all_providers();

        assert_eq!(settings.active, ProviderId::OpenAi);
        assert_eq!(settings.entry(ProviderId::OpenAi).model_name, "gpt-4o");
        assert_eq!(settings.entry(ProviderId::Local).model_name, "qwen2.5:14b");
        assert_eq!(settings.providers.len(), 3);
    }

    #[test]
    fn test_override_from_blank_fields_is_empty() {
        let o = ProviderOverride::from_fields(Some(" "), Some(""), None).unwrap();
        assert!(o.provider.is_none() && o.model.is_none() && o.credential.is_none());
        assert!(ProviderOverride::from_fields(Some("gemini"), None, None).is_err());
    }
}
