//! Advisor configuration management
//!
//! Handles loading and validating provider configuration from:
//! 1. Environment variables (highest priority)
//! 2. Project config file (.statpilot/advisor.yaml)
//! 3. Global config file (~/.statpilot/advisor.yaml)
//! 4. Built-in defaults (lowest priority)
//!
//! Credentials are only ever read from the environment.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::AdvisorError;

/// Env var holding the remote provider credential
pub const ENV_REMOTE_API_KEY: &str = "STATPILOT_LLM_API_KEY";
/// Env var holding the comma-separated remote model list
pub const ENV_REMOTE_MODELS: &str = "STATPILOT_LLM_MODELS";
/// Env var overriding the remote endpoint
pub const ENV_REMOTE_BASE_URL: &str = "STATPILOT_LLM_BASE_URL";
/// Env var overriding the remote request timeout
pub const ENV_REMOTE_TIMEOUT_SECS: &str = "STATPILOT_LLM_TIMEOUT_SECS";
/// Env var overriding the local endpoint
pub const ENV_LOCAL_BASE_URL: &str = "STATPILOT_LOCAL_BASE_URL";
/// Env var holding the comma-separated local model list
pub const ENV_LOCAL_MODELS: &str = "STATPILOT_LOCAL_MODELS";
/// Env var selecting local-first provider order
pub const ENV_PREFER_LOCAL: &str = "STATPILOT_PREFER_LOCAL";

const DEFAULT_REMOTE_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_LOCAL_MODEL: &str = "llama3.1";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Streams legitimately outlive a single request
const STREAM_TIMEOUT_MULTIPLIER: u32 = 4;
/// Longest accepted request timeout
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// Connection settings for one provider. Built once per process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Bearer credential; `None` for backends that need none
    pub api_key: Option<String>,
    /// Models tried in order against the same backend
    pub models: Vec<String>,
    /// Base endpoint, without trailing slash
    pub base_url: String,
    /// Default sampling temperature
    pub temperature: f32,
    /// Default completion token budget
    pub max_tokens: u32,
    /// Timeout for a single non-streaming request
    pub timeout: Duration,
    requires_key: bool,
}

impl ProviderConfig {
    /// Defaults for the remote OpenAI-compatible provider (disabled until a key and models are set)
    pub fn remote_defaults() -> Self {
        Self {
            api_key: None,
            models: Vec::new(),
            base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            requires_key: true,
        }
    }

    /// Defaults for the local Ollama provider
    pub fn local_defaults() -> Self {
        Self {
            api_key: None,
            models: vec![DEFAULT_LOCAL_MODEL.to_string()],
            base_url: DEFAULT_LOCAL_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            requires_key: false,
        }
    }

    /// Remote provider config pointed at `base_url`
    pub fn remote(
        base_url: impl Into<String>,
        api_key: Option<String>,
        models: Vec<String>,
    ) -> Self {
        Self {
            api_key,
            models,
            base_url: trim_base_url(base_url.into()),
            ..Self::remote_defaults()
        }
    }

    /// Local provider config pointed at `base_url`
    pub fn local(base_url: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            models,
            base_url: trim_base_url(base_url.into()),
            ..Self::local_defaults()
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default token budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Whether this provider has everything it needs to be called
    pub fn is_configured(&self) -> bool {
        let has_key = !self.requires_key || self.api_key.as_deref().is_some_and(|k| !k.is_empty());
        has_key && !self.models.is_empty()
    }

    /// Timeout applied to a whole streaming response
    pub fn stream_timeout(&self) -> Duration {
        self.timeout
            .checked_mul(STREAM_TIMEOUT_MULTIPLIER)
            .unwrap_or(Duration::MAX)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AdvisorError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AdvisorError::ConfigError(format!(
                "Base URL must start with http:// or https://: {}",
                self.base_url
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AdvisorError::ConfigError(format!(
                "Temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }

        if self.timeout.is_zero() {
            return Err(AdvisorError::ConfigError(
                "Timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.timeout > Duration::from_secs(MAX_TIMEOUT_SECS) {
            return Err(AdvisorError::ConfigError(format!(
                "Timeout must be at most {} seconds, got {}",
                MAX_TIMEOUT_SECS,
                self.timeout.as_secs()
            )));
        }

        Ok(())
    }
}

/// Cache lifetimes for health check outcomes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthTtls {
    /// Probe succeeded
    pub healthy: Duration,
    /// Probe failed at the network level or returned an error status
    pub unreachable: Duration,
    /// Backend rejected the credential
    pub rejected: Duration,
    /// Provider has no credential or models
    pub not_configured: Duration,
    /// Timeout for a single probe
    pub probe_timeout: Duration,
}

impl Default for HealthTtls {
    fn default() -> Self {
        Self {
            healthy: Duration::from_secs(300),
            unreachable: Duration::from_secs(30),
            rejected: Duration::from_secs(900),
            not_configured: Duration::from_secs(3600),
            probe_timeout: Duration::from_secs(3),
        }
    }
}

impl HealthTtls {
    /// Validate the TTL ordering.
    ///
    /// A misconfigured credential is not going to fix itself, so it must be
    /// cached longer than a transient network failure.
    pub fn validate(&self) -> Result<(), AdvisorError> {
        if self.rejected <= self.unreachable {
            return Err(AdvisorError::ConfigError(format!(
                "Rejected-credential TTL ({:?}) must exceed unreachable TTL ({:?})",
                self.rejected, self.unreachable
            )));
        }
        if self.probe_timeout.is_zero() {
            return Err(AdvisorError::ConfigError(
                "Health probe timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete advisor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorConfig {
    /// Remote OpenAI-compatible provider
    pub remote: ProviderConfig,
    /// Local Ollama provider
    pub local: ProviderConfig,
    /// Try the local provider first
    pub prefer_local: bool,
    /// Health cache lifetimes
    pub health: HealthTtls,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            remote: ProviderConfig::remote_defaults(),
            local: ProviderConfig::local_defaults(),
            prefer_local: false,
            health: HealthTtls::default(),
        }
    }
}

impl AdvisorConfig {
    /// Load configuration with proper precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Project config (.statpilot/advisor.yaml)
    /// 3. Global config (~/.statpilot/advisor.yaml)
    /// 4. Built-in defaults (lowest priority)
    pub fn load_with_precedence() -> Result<Self, AdvisorError> {
        let mut config = Self::default();

        if let Some(global_config_path) = Self::get_global_config_path() {
            if global_config_path.exists() {
                debug!("Loading global advisor config from {:?}", global_config_path);
                config.merge_from_file(&global_config_path)?;
            }
        }

        let project_config_path = Self::get_project_config_path();
        if project_config_path.exists() {
            debug!("Loading project advisor config from {:?}", project_config_path);
            config.merge_from_file(&project_config_path)?;
        }

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Global configuration path (~/.statpilot/advisor.yaml)
    pub fn get_global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".statpilot/advisor.yaml"))
    }

    /// Project configuration path (.statpilot/advisor.yaml)
    pub fn get_project_config_path() -> PathBuf {
        PathBuf::from(".statpilot/advisor.yaml")
    }

    /// Apply environment variables on top of the current configuration
    pub fn load_from_env(&mut self) {
        if let Some(key) = env_value(ENV_REMOTE_API_KEY) {
            debug!("Loading {} from environment", ENV_REMOTE_API_KEY);
            self.remote.api_key = Some(key);
        }

        if let Some(models) = env_value(ENV_REMOTE_MODELS) {
            self.remote.models = parse_model_list(&models);
            debug!("Loading remote models from environment: {:?}", self.remote.models);
        }

        if let Some(url) = env_value(ENV_REMOTE_BASE_URL) {
            debug!("Loading {} from environment: {}", ENV_REMOTE_BASE_URL, url);
            self.remote.base_url = trim_base_url(url);
        }

        if let Some(timeout_str) = env_value(ENV_REMOTE_TIMEOUT_SECS) {
            match timeout_str.parse::<u64>() {
                Ok(timeout) => self.remote.timeout = Duration::from_secs(timeout),
                Err(_) => warn!("Invalid {} value: {}", ENV_REMOTE_TIMEOUT_SECS, timeout_str),
            }
        }

        if let Some(url) = env_value(ENV_LOCAL_BASE_URL) {
            debug!("Loading {} from environment: {}", ENV_LOCAL_BASE_URL, url);
            self.local.base_url = trim_base_url(url);
        }

        if let Some(models) = env_value(ENV_LOCAL_MODELS) {
            self.local.models = parse_model_list(&models);
            debug!("Loading local models from environment: {:?}", self.local.models);
        }

        if let Some(flag) = env_value(ENV_PREFER_LOCAL) {
            match parse_bool(&flag) {
                Some(prefer_local) => self.prefer_local = prefer_local,
                None => warn!("Invalid {} value: {}", ENV_PREFER_LOCAL, flag),
            }
        }
    }

    /// Merge configuration from a YAML file; only fields present in the file are overridden
    pub fn merge_from_file(&mut self, path: &Path) -> Result<(), AdvisorError> {
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AdvisorError::ConfigError(format!("Failed to read advisor config file: {}", e))
        })?;

        let file_config: AdvisorFileConfig = serde_yaml::from_str(&content).map_err(|e| {
            AdvisorError::ConfigError(format!("Failed to parse advisor config file: {}", e))
        })?;

        let Some(advisor) = file_config.advisor else {
            return Ok(());
        };

        if let Some(prefer_local) = advisor.prefer_local {
            self.prefer_local = prefer_local;
        }
        if let Some(remote) = advisor.remote {
            remote.apply_to(&mut self.remote);
        }
        if let Some(local) = advisor.local {
            local.apply_to(&mut self.local);
        }
        if let Some(health) = advisor.health {
            health.apply_to(&mut self.health);
        }

        Ok(())
    }

    /// Validate the final configuration
    pub fn validate(&self) -> Result<(), AdvisorError> {
        self.remote.validate()?;
        self.local.validate()?;
        self.health.validate()
    }
}

/// Parse a comma-separated model list, dropping blanks
pub fn parse_model_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// YAML file structure for advisor configuration
#[derive(Debug, Deserialize)]
struct AdvisorFileConfig {
    advisor: Option<AdvisorFileSettings>,
}

/// Advisor settings from YAML file (all fields optional)
#[derive(Debug, Deserialize)]
struct AdvisorFileSettings {
    prefer_local: Option<bool>,
    remote: Option<ProviderFileSettings>,
    local: Option<ProviderFileSettings>,
    health: Option<HealthFileSettings>,
}

#[derive(Debug, Deserialize)]
struct ProviderFileSettings {
    base_url: Option<String>,
    models: Option<Vec<String>>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

impl ProviderFileSettings {
    fn apply_to(self, config: &mut ProviderConfig) {
        if let Some(base_url) = self.base_url {
            config.base_url = trim_base_url(base_url);
        }
        if let Some(models) = self.models {
            config.models = models.into_iter().filter(|m| !m.trim().is_empty()).collect();
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(timeout_secs);
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthFileSettings {
    healthy_ttl_secs: Option<u64>,
    unreachable_ttl_secs: Option<u64>,
    rejected_ttl_secs: Option<u64>,
    not_configured_ttl_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
}

impl HealthFileSettings {
    fn apply_to(self, ttls: &mut HealthTtls) {
        if let Some(secs) = self.healthy_ttl_secs {
            ttls.healthy = Duration::from_secs(secs);
        }
        if let Some(secs) = self.unreachable_ttl_secs {
            ttls.unreachable = Duration::from_secs(secs);
        }
        if let Some(secs) = self.rejected_ttl_secs {
            ttls.rejected = Duration::from_secs(secs);
        }
        if let Some(secs) = self.not_configured_ttl_secs {
            ttls.not_configured = Duration::from_secs(secs);
        }
        if let Some(secs) = self.probe_timeout_secs {
            ttls.probe_timeout = Duration::from_secs(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_list() {
        assert_eq!(
            parse_model_list(" gpt-4o-mini, ,deepseek/deepseek-chat ,"),
            vec!["gpt-4o-mini", "deepseek/deepseek-chat"]
        );
        assert!(parse_model_list("").is_empty());
    }

    #[test]
    fn test_remote_requires_key_and_models() {
        let config = ProviderConfig::remote_defaults();
        assert!(!config.is_configured());

        let config = ProviderConfig::remote("https://example.com/v1", None, vec!["m".to_string()]);
        assert!(!config.is_configured());

        let config = ProviderConfig::remote(
            "https://example.com/v1",
            Some("key".to_string()),
            Vec::new(),
        );
        assert!(!config.is_configured());

        let config = ProviderConfig::remote(
            "https://example.com/v1/",
            Some("key".to_string()),
            vec!["m".to_string()],
        );
        assert!(config.is_configured());
        assert_eq!(config.base_url, "https://example.com/v1");
    }

    #[test]
    fn test_local_needs_no_key() {
        let config = ProviderConfig::local_defaults();
        assert!(config.is_configured());
        assert!(!ProviderConfig::local("http://localhost:11434", Vec::new()).is_configured());
    }

    #[test]
    fn test_stream_timeout_is_multiple_of_request_timeout() {
        let config = ProviderConfig::local_defaults().with_timeout(Duration::from_secs(10));
        assert_eq!(config.stream_timeout(), Duration::from_secs(40));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ProviderConfig::local("localhost:11434", vec!["m".to_string()]);
        assert!(config.validate().is_err());

        let config = ProviderConfig::local_defaults().with_temperature(3.5);
        assert!(config.validate().is_err());

        let config = ProviderConfig::local_defaults().with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = ProviderConfig::local_defaults()
            .with_timeout(Duration::from_secs(MAX_TIMEOUT_SECS + 1));
        assert!(config.validate().is_err());

        assert!(ProviderConfig::local_defaults().validate().is_ok());
    }

    #[test]
    fn test_stream_timeout_saturates_instead_of_overflowing() {
        let config = ProviderConfig::local_defaults().with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(config.stream_timeout(), Duration::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_health_ttl_ordering() {
        let ttls = HealthTtls::default();
        assert!(ttls.rejected > ttls.unreachable);
        assert!(ttls.validate().is_ok());

        let bad = HealthTtls {
            rejected: Duration::from_secs(10),
            unreachable: Duration::from_secs(30),
            ..HealthTtls::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
