use reqwest::Url;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Service base URL parses as http(s)
/// - Timeouts, tick interval and size ceiling are not 0
/// - Progress step is within 1..=100
/// - Poll backoff ceiling is not below the initial interval
/// - Poll failure limit and poll deadline are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let url = Url::parse(&config.service.base_url).map_err(|e| {
        ConfigError::ValidationError(format!(
            "service.base_url is not a valid URL ({}): {}",
            config.service.base_url, e
        ))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "service.base_url must use http or https, got {}",
            url.scheme()
        )));
    }

    let service = &config.service;
    if service.connect_timeout_secs == 0
        || service.idle_timeout_secs == 0
        || service.process_timeout_secs == 0
        || service.status_timeout_secs == 0
    {
        return Err(ConfigError::ValidationError(
            "service timeouts cannot be 0".to_string(),
        ));
    }

    if config.upload.max_size_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "upload.max_size_bytes cannot be 0".to_string(),
        ));
    }

    let processing = &config.processing;
    if processing.tick_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "processing.tick_interval_ms cannot be 0".to_string(),
        ));
    }
    if processing.progress_step == 0 || processing.progress_step > 100 {
        return Err(ConfigError::ValidationError(format!(
            "processing.progress_step must be within 1..=100, got {}",
            processing.progress_step
        )));
    }
    if processing.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "processing.poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if processing.poll_max_interval_ms < processing.poll_interval_ms {
        return Err(ConfigError::ValidationError(
            "processing.poll_max_interval_ms cannot be below poll_interval_ms".to_string(),
        ));
    }
    if processing.poll_max_failures == 0 || processing.poll_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "processing.poll_max_failures and poll_timeout_ms cannot be 0".to_string(),
        ));
    }

    Ok(())
}
