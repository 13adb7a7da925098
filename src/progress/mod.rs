//! Progress tracking for long-running operations
//!
//! A [`ProgressTracker`] holds completed/total counters keyed by a task key.
//! Crawls register `chapters + 1` units under the selected book URL: one per
//! chapter task and one for the merge.

mod task;
mod tracker;

pub use task::BackgroundTask;
pub use tracker::{ProgressSnapshot, ProgressTracker};
