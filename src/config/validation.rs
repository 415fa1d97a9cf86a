use crate::protocol::ProviderProfile;

use super::{ClientConfig, ConfigError};

/// Validate the full client config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    validate_api_config(config)?;
    validate_http_config(config)?;
    validate_log_level(config)?;
    validate_features(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_api_config(config: &ClientConfig) -> Result<(), ConfigError> {
    let api = &config.api;
    let base_url = api.base_url.trim();
    if base_url.is_empty() {
        return Err(validation_err("api.base_url cannot be empty"));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(validation_err(
            "api.base_url must start with http:// or https://",
        ));
    }
    if api.api_key.trim().is_empty() {
        return Err(validation_err("api.api_key cannot be empty"));
    }
    if let Some(format) = api.api_format.as_deref() {
        if ProviderProfile::from_explicit(format).is_none() {
            let valid: Vec<&str> = ProviderProfile::ALL.iter().map(|p| p.as_str()).collect();
            return Err(validation_err(format!(
                "api.api_format '{format}' is unknown. Must be one of: {}",
                valid.join(", ")
            )));
        }
    }
    Ok(())
}

fn validate_http_config(config: &ClientConfig) -> Result<(), ConfigError> {
    let http = &config.http;
    if http.timeout == 0 {
        return Err(validation_err("http.timeout must be greater than 0"));
    }
    if http.connect_timeout == 0 {
        return Err(validation_err("http.connect_timeout must be greater than 0"));
    }
    validate_proxy_url(http.proxy.as_deref())
}

fn validate_proxy_url(proxy: Option<&str>) -> Result<(), ConfigError> {
    let Some(proxy) = proxy.map(str::trim) else {
        return Ok(());
    };
    if proxy.is_empty() {
        return Err(validation_err("http.proxy cannot be empty when set"));
    }
    let parsed = url::Url::parse(proxy)
        .map_err(|err| validation_err(format!("http.proxy is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err("http.proxy must use http:// or https://"));
    }
    Ok(())
}

fn validate_log_level(config: &ClientConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

fn validate_features(config: &ClientConfig) -> Result<(), ConfigError> {
    let features = &config.features;
    if features.update_interval_ms == 0 {
        return Err(validation_err(
            "features.update_interval_ms must be greater than 0",
        ));
    }
    if features
        .misfiled_think_silently_prefix
        .as_deref()
        .is_some_and(|prefix| prefix.trim().is_empty())
    {
        return Err(validation_err(
            "features.misfiled_think_silently_prefix cannot be empty when set",
        ));
    }
    if features
        .misfiled_think_silently_prefixes
        .iter()
        .any(|prefix| prefix.trim().is_empty())
    {
        return Err(validation_err(
            "features.misfiled_think_silently_prefixes contains an empty prefix",
        ));
    }
    Ok(())
}
