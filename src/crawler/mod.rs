//! Crawl orchestration
//!
//! This module drives a selected search result through its phases:
//! - Book metadata and directory creation
//! - Catalog parsing with fixed ordinals
//! - Bounded concurrent chapter downloads reported to the progress tracker
//! - Merging the chapter files into one book

mod concurrency;
mod coordinator;
mod phase;

pub use concurrency::{resolve_concurrency, MAX_CONCURRENCY};
pub use coordinator::{AppContext, Crawler};
pub use phase::{CrawlPhase, PhaseTracker};
