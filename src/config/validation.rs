use crate::config::types::{BaseConfig, CrawlConfig, RetryConfig, Settings};
use crate::ConfigError;

/// Upper bound accepted for an explicit thread count
const MAX_CONFIGURED_THREADS: i32 = 64;

/// Validates the entire configuration
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    validate_base_config(&settings.base)?;
    validate_crawl_config(&settings.crawl)?;
    validate_retry_config(&settings.retry)?;
    Ok(())
}

/// Validates source selection and output location
fn validate_base_config(config: &BaseConfig) -> Result<(), ConfigError> {
    if config.download_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "download-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates chapter download behavior
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.threads < -1 || config.threads > MAX_CONFIGURED_THREADS {
        return Err(ConfigError::Validation(format!(
            "threads must be -1 (auto) or between 0 and {}, got {}",
            MAX_CONFIGURED_THREADS, config.threads
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry base-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}
