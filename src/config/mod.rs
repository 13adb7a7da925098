//! Configuration module for Shiori
//!
//! This module handles loading, parsing, and validating the TOML settings
//! file. The crawler consumes the result as a read-only [`Settings`] snapshot.
//!
//! # Example
//!
//! ```no_run
//! use shiori::config::load_config;
//! use std::path::Path;
//!
//! let settings = load_config(Path::new("shiori.toml")).unwrap();
//! println!("Exporting as {}", settings.base.export_format);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BackoffKind, BaseConfig, CrawlConfig, ExportFormat, RetryConfig, RulesConfig, Settings,
    DEFAULT_MAX_ATTEMPTS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
