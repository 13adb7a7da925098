use crate::ConfigError;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main settings structure for Shiori
///
/// One snapshot is cloned into every crawl; a running crawl never observes
/// later changes.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base: BaseConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Source selection and output location
#[derive(Debug, Clone, Deserialize)]
pub struct BaseConfig {
    /// Identifier of the source rule to crawl with
    #[serde(rename = "source-id")]
    pub source_id: u32,

    /// Root directory under which book directories are created
    #[serde(rename = "download-path")]
    pub download_path: PathBuf,

    /// Export format of the merged book
    #[serde(rename = "extname")]
    pub export_format: ExportFormat,

    /// Default log filter when no verbosity flag is given
    #[serde(rename = "log-level", default = "default_log_level")]
    pub log_level: String,
}

/// Chapter download behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Concurrent chapter downloads; -1 (or 0) picks a value from the host
    #[serde(default = "default_threads")]
    pub threads: i32,

    /// Lower bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "min-delay-ms", default)]
    pub min_delay_ms: u64,

    /// Upper bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "max-delay-ms", default)]
    pub max_delay_ms: u64,

    /// Per-request timeout
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Per-URL retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Failures tolerated per URL before giving up; 0 selects the default
    #[serde(rename = "max-attempts", default)]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: BackoffKind,

    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "max-delay-ms", default = "default_max_backoff_ms")]
    pub max_delay_ms: u64,
}

/// Where source rules are read from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    /// Directory holding `rule<ID>.json` files; the bundled set is used when unset
    pub directory: Option<PathBuf>,
}

/// Growth of the delay between retries of one URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Linear,
    #[default]
    Exponential,
}

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Txt,
    Epub,
    Html,
}

/// Default number of failures tolerated per URL
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

fn default_log_level() -> String {
    "info".to_string()
}

fn default_threads() -> i32 {
    -1
}

fn default_timeout_secs() -> u64 {
    25
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            min_delay_ms: 0,
            max_delay_ms: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            backoff: BackoffKind::default(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_backoff_ms(),
        }
    }
}

impl Settings {
    /// Builds settings with defaults for everything except the essentials
    pub fn new(source_id: u32, download_path: impl Into<PathBuf>, export_format: ExportFormat) -> Self {
        Self {
            base: BaseConfig {
                source_id,
                download_path: download_path.into(),
                export_format,
                log_level: default_log_level(),
            },
            crawl: CrawlConfig::default(),
            retry: RetryConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

impl CrawlConfig {
    /// Inter-request delay window, or None when requests are not spaced
    pub fn delay_window(&self) -> Option<(Duration, Duration)> {
        if self.max_delay_ms == 0 {
            return None;
        }
        Some((
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        ))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    /// Failure ceiling per URL with the zero value mapped to the default
    pub fn effective_max_attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            DEFAULT_MAX_ATTEMPTS
        } else {
            self.max_attempts
        }
    }
}

impl ExportFormat {
    /// File extension written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Epub => "epub",
            Self::Html => "html",
        }
    }

    /// Whether chapters are rendered as XHTML sections rather than plain text
    pub fn is_markup(&self) -> bool {
        matches!(self, Self::Epub | Self::Html)
    }
}

impl FromStr for ExportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "txt" => Ok(Self::Txt),
            "epub" => Ok(Self::Epub),
            "html" => Ok(Self::Html),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl<'de> Deserialize<'de> for ExportFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
