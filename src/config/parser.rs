use crate::config::types::Settings;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a settings file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML settings file
///
/// # Returns
///
/// * `Ok(Settings)` - Successfully loaded and validated settings
/// * `Err(ConfigError)` - Failed to load, parse, or validate the settings
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use shiori::config::load_config;
///
/// let settings = load_config(Path::new("shiori.toml")).unwrap();
/// println!("Source: {}", settings.base.source_id);
/// ```
pub fn load_config(path: &Path) -> Result<Settings, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates settings from TOML text
pub fn parse_config(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = toml::from_str(content)?;
    validate(&settings)?;
    Ok(settings)
}

/// Computes a SHA-256 hash of the settings file content
///
/// Logged at startup so a download can be traced back to the exact
/// settings it ran with.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads settings and returns both the settings and the file hash
pub fn load_config_with_hash(path: &Path) -> Result<(Settings, String), ConfigError> {
    let settings = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((settings, hash))
}
