use crate::config::types::{ClientConfig, Config, DownloadConfig, OutputConfig, SchedulerConfig};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_scheduler_config(&config.scheduler)?;
    validate_client_config(&config.client)?;
    validate_download_config(&config.download)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates worker pool and retry settings
fn validate_scheduler_config(config: &SchedulerConfig) -> ConfigResult<()> {
    if config.num_workers < 1 || config.num_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "num_workers must be between 1 and 100, got {}",
            config.num_workers
        )));
    }

    if config.chunk_size < 1 {
        return Err(ConfigError::Validation(format!(
            "chunk_size must be >= 1, got {}",
            config.chunk_size
        )));
    }

    if config.request_delay_min_ms > config.request_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "request_delay_min_ms ({}) must not exceed request_delay_max_ms ({})",
            config.request_delay_min_ms, config.request_delay_max_ms
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates HTTP client settings
fn validate_client_config(config: &ClientConfig) -> ConfigResult<()> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.pool_size == Some(0) {
        return Err(ConfigError::Validation(
            "pool_size must be >= 1 when set".to_string(),
        ));
    }

    if config.download_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "download_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the download stage
fn validate_download_config(config: &DownloadConfig) -> ConfigResult<()> {
    if config.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "download workers must be between 0 and 100, got {}",
            config.workers
        )));
    }

    if config.request_delay_min_ms > config.request_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "download request_delay_min_ms ({}) must not exceed request_delay_max_ms ({})",
            config.request_delay_min_ms, config.request_delay_max_ms
        )));
    }

    if config.enabled() && config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "download directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.items_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "items_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
