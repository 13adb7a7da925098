//! Shiori: a rule-driven serialized fiction downloader
//!
//! This crate searches configurable novel sites, crawls a book's chapter
//! catalog with a bounded pool of concurrent fetch sessions, converts every
//! chapter into the configured export format and merges the result into a
//! single book file (plain text, HTML or EPUB).

pub mod config;
pub mod crawler;
pub mod fetch;
pub mod model;
pub mod output;
pub mod parse;
pub mod progress;
pub mod rules;

use thiserror::Error;

/// Main error type for Shiori operations
#[derive(Debug, Error)]
pub enum ShioriError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Invalid request for {url}: {message}")]
    InvalidRequest { url: String, message: String },

    #[error("Gave up on {url} after {attempts} failed attempts: {message}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Extraction error for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crawler::CrawlPhase,
        to: crawler::CrawlPhase,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Crawl cancelled")]
    Cancelled,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
}

/// Source rule errors
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("No rule found for source id {0}")]
    UnknownSource(u32),

    #[error("Failed to read rule for source {id}: {source}")]
    Io { id: u32, source: std::io::Error },

    #[error("Malformed rule for source {id}: {source}")]
    Malformed { id: u32, source: serde_json::Error },

    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Result type alias for Shiori operations
pub type Result<T> = std::result::Result<T, ShioriError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for rule operations
pub type RuleResult<T> = std::result::Result<T, RuleError>;

// Re-export commonly used types
pub use config::{ExportFormat, Settings};
pub use crawler::{AppContext, Crawler};
pub use model::{Book, Chapter, CrawlResult, SearchResult};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use rules::{Rule, RuleStore};
