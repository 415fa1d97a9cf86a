pub mod validation;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Optional per-endpoint tweaks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedSettings {
    #[serde(default, alias = "systemPrompt")]
    pub system_prompt: Option<String>,
}

/// Upstream endpoint and credentials for one call.
///
/// Field aliases accept the camelCase names used by browser-side settings
/// exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default, alias = "baseUrl")]
    pub base_url: String,
    #[serde(default, alias = "apiKey")]
    pub api_key: String,
    #[serde(default, alias = "modelName")]
    pub model_name: Option<String>,
    #[serde(default, alias = "apiFormat")]
    pub api_format: Option<String>,
    #[serde(default, alias = "advancedSettings")]
    pub advanced_settings: Option<AdvancedSettings>,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Configured system prompt template, empty when unset.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        self.advanced_settings
            .as_ref()
            .and_then(|settings| settings.system_prompt.as_deref())
            .unwrap_or("")
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default)]
    pub http_use_env_proxy: bool,
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_timeout() -> u64 {
    180
}
fn default_connect_timeout() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            http_use_env_proxy: false,
            proxy: None,
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_user_language")]
    pub user_language: String,
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    #[serde(default)]
    pub detect_misfiled_think_silently: bool,
    #[serde(default)]
    pub misfiled_think_silently_prefix: Option<String>,
    #[serde(default)]
    pub misfiled_think_silently_prefixes: Vec<String>,
}

fn default_log_level() -> String {
    "INFO".to_string()
}
fn default_user_language() -> String {
    "en".to_string()
}
fn default_update_interval_ms() -> u64 {
    100
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            user_language: default_user_language(),
            update_interval_ms: default_update_interval_ms(),
            detect_misfiled_think_silently: false,
            misfiled_think_silently_prefix: None,
            misfiled_think_silently_prefixes: Vec::new(),
        }
    }
}

impl FeaturesConfig {
    #[must_use]
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<ClientConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Same as [`load_config`], minus I/O.
pub fn parse_config(contents: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}
