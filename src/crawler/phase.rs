//! Crawl phase definitions for tracking a run
//!
//! A crawl moves strictly forward through its phases; any phase may fail.

use crate::{Result, ShioriError};
use std::fmt;

/// Represents the current phase of one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    // ===== Active Phases =====
    /// Fetching book metadata for the selected search result
    Resolving,

    /// Book metadata known, book directory created
    BookFetched,

    /// Chapter catalog parsed and ordinals assigned
    CatalogFetched,

    /// Chapter tasks are running
    Downloading,

    /// Chapter files are being merged into the book
    Merging,

    // ===== Terminal Phases =====
    /// The merged book was written
    Done,

    /// The catalog was empty; nothing was downloaded or merged
    Empty,

    /// A phase-level error aborted the crawl
    Failed,
}

impl CrawlPhase {
    /// Returns true if this is a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Empty | Self::Failed)
    }

    /// Returns true if `next` may directly follow this phase
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        if next == Self::Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Self::Resolving, Self::BookFetched)
                | (Self::BookFetched, Self::CatalogFetched)
                | (Self::CatalogFetched, Self::Downloading)
                | (Self::CatalogFetched, Self::Empty)
                | (Self::Downloading, Self::Merging)
                | (Self::Merging, Self::Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::BookFetched => "book_fetched",
            Self::CatalogFetched => "catalog_fetched",
            Self::Downloading => "downloading",
            Self::Merging => "merging",
            Self::Done => "done",
            Self::Empty => "empty",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Phase tracker of a single crawl, keyed by the book URL for logging
#[derive(Debug)]
pub struct PhaseTracker {
    key: String,
    phase: CrawlPhase,
}

impl PhaseTracker {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            phase: CrawlPhase::Resolving,
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Moves to `next`, rejecting transitions that skip or revisit a phase
    pub fn advance(&mut self, next: CrawlPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(ShioriError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::info!("Crawl {}: {} -> {}", self.key, self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Marks the crawl failed unless it already ended
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            tracing::warn!("Crawl {}: {} -> {}", self.key, self.phase, CrawlPhase::Failed);
            self.phase = CrawlPhase::Failed;
        }
    }
}
