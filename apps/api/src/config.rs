use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{CallOptions, ProviderId, MAX_PROBE_TIMEOUT};
use crate::settings::Credential;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Root of the artifact store (`resumes/` and `cover_letters/` live here).
    pub storage_dir: PathBuf,
    pub settings_path: PathBuf,
    pub ollama_url: String,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub openai_api_key: Option<Credential>,
    pub anthropic_api_key: Option<Credential>,
    pub timeouts: ProviderTimeouts,
    pub max_upload_bytes: usize,
}

/// Per-provider call bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderTimeouts {
    pub local: Duration,
    pub hosted: Duration,
    pub probe: Duration,
    pub retry_backoff: Duration,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            local: Duration::from_secs(120),
            hosted: Duration::from_secs(60),
            probe: MAX_PROBE_TIMEOUT,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl ProviderTimeouts {
    pub fn call_options(&self, provider: ProviderId) -> CallOptions {
        CallOptions {
            timeout: match provider {
                ProviderId::Local => self.local,
                ProviderId::OpenAi | ProviderId::Anthropic => self.hosted,
            },
            probe_timeout: self.probe.min(MAX_PROBE_TIMEOUT),
            retry_backoff: self.retry_backoff,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage_dir = PathBuf::from(env_or("STORAGE_DIR", "data"));
        let settings_path = std::env::var("SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| storage_dir.join("settings.json"));

        // Probes are capped at MAX_PROBE_TIMEOUT whatever the environment says.
        let probe_secs: u64 = parse_env("PROBE_TIMEOUT_SECS", 5)?;
        let timeouts = ProviderTimeouts {
            local: Duration::from_secs(parse_env("LOCAL_TIMEOUT_SECS", 120)?),
            hosted: Duration::from_secs(parse_env("HOSTED_TIMEOUT_SECS", 60)?),
            probe: Duration::from_secs(probe_secs).min(MAX_PROBE_TIMEOUT),
            retry_backoff: Duration::from_millis(parse_env("RETRY_BACKOFF_MS", 500)?),
        };

        let max_upload_mb: usize = parse_env("MAX_UPLOAD_MB", 10)?;

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            storage_dir,
            settings_path,
            ollama_url: env_or("OLLAMA_URL", ProviderId::Local.default_endpoint()),
            openai_base_url: env_or("OPENAI_BASE_URL", ProviderId::OpenAi.default_endpoint()),
            anthropic_base_url: env_or(
                "ANTHROPIC_BASE_URL",
                ProviderId::Anthropic.default_endpoint(),
            ),
            openai_api_key: optional_credential("OPENAI_API_KEY"),
            anthropic_api_key: optional_credential("ANTHROPIC_API_KEY"),
            timeouts,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }

    /// Endpoint the registry starts from for `provider` when the settings
    /// file does not override it.
    pub fn endpoint(&self, provider: ProviderId) -> &str {
        match provider {
            ProviderId::Local => &self.ollama_url,
            ProviderId::OpenAi => &self.openai_base_url,
            ProviderId::Anthropic => &self.anthropic_base_url,
        }
    }

    /// Environment-sourced credential, the last resort in credential resolution.
    pub fn env_credential(&self, provider: ProviderId) -> Option<&Credential> {
        match provider {
            ProviderId::Local => None,
            ProviderId::OpenAi => self.openai_api_key.as_ref(),
            ProviderId::Anthropic => self.anthropic_api_key.as_ref(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn optional_credential(key: &str) -> Option<Credential> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(Credential::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_pick_timeout_per_provider() {
        let timeouts = ProviderTimeouts::default();
        assert_eq!(
            timeouts.call_options(ProviderId::Local).timeout,
            Duration::from_secs(120)
        );
        assert_eq!(
            timeouts.call_options(ProviderId::Anthropic).timeout,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_probe_timeout_is_clamped() {
        let timeouts = ProviderTimeouts {
            probe: Duration::from_secs(30),
            ..ProviderTimeouts::default()
        };
        assert_eq!(
            timeouts.call_options(ProviderId::OpenAi).probe_timeout,
            MAX_PROBE_TIMEOUT
        );
    }

    #[test]
    fn test_parse_env_defaults_when_unset() {
        let value: u16 = parse_env("TAILOR_TEST_SURELY_UNSET_VAR", 8080).unwrap();
        assert_eq!(value, 8080);
    }
}
