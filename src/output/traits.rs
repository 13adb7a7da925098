//! Book merger trait and output errors
//!
//! A merger assembles the per-chapter files of one book directory into a
//! single book file of its export format.

use crate::config::ExportFormat;
use crate::model::Book;
use crate::output::files::ChapterFile;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while persisting chapters or merging a book
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EPUB packaging error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("No chapter files found in {0}")]
    NoChapterFiles(PathBuf),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Cover image bytes fetched for an EPUB
#[derive(Debug, Clone)]
pub struct CoverImage {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub extension: &'static str,
}

impl CoverImage {
    /// Sniffs the image type from its leading bytes, falling back to the URL suffix
    pub fn new(bytes: Vec<u8>, url: &str) -> Self {
        let (media_type, extension) = if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            ("image/png", "png")
        } else if bytes.starts_with(b"GIF8") {
            ("image/gif", "gif")
        } else if bytes.len() > 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            ("image/webp", "webp")
        } else if bytes.starts_with(&[0xFF, 0xD8]) || !url.to_ascii_lowercase().ends_with(".png") {
            ("image/jpeg", "jpg")
        } else {
            ("image/png", "png")
        };
        Self {
            bytes,
            media_type,
            extension,
        }
    }
}

/// Assembles chapter files into one book
///
/// Implementations receive the chapter files already sorted by ordinal
/// and write the merged book to `target`.
pub trait BookMerger: Send + Sync {
    /// Format this merger produces
    fn format(&self) -> ExportFormat;

    /// Writes the merged book
    ///
    /// # Arguments
    ///
    /// * `book` - Metadata written into the book header
    /// * `chapters` - Chapter files in ordinal order
    /// * `cover` - Optional cover image (only used by formats that embed it)
    /// * `target` - Path of the merged file
    fn merge(
        &self,
        book: &Book,
        chapters: &[ChapterFile],
        cover: Option<&CoverImage>,
        target: &Path,
    ) -> OutputResult<()>;

    /// Whether the per-chapter working directory survives the merge
    fn keeps_directory(&self) -> bool {
        false
    }
}
