//! Output module for converting chapters and merging books
//!
//! This module handles:
//! - Converting raw chapter HTML into the export format
//! - Persisting one file per chapter in the book directory
//! - Merging chapter files, in ordinal order, into a single book file

pub mod convert;
mod epub;
pub mod files;
mod html;
mod traits;
mod txt;

pub use convert::{ContentFilter, Converter};
pub use epub::{book_identifier, EpubMerger};
pub use files::{chapter_file_name, sanitize_file_name, write_chapter_file, ChapterFile};
pub use html::HtmlMerger;
pub use traits::{BookMerger, CoverImage, OutputError, OutputResult};
pub use txt::TxtMerger;

use crate::config::ExportFormat;
use crate::model::Book;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the merger producing the given format
pub fn merger_for(format: ExportFormat) -> Box<dyn BookMerger> {
    match format {
        ExportFormat::Txt => Box::new(TxtMerger),
        ExportFormat::Epub => Box::new(EpubMerger),
        ExportFormat::Html => Box::new(HtmlMerger),
    }
}

/// Merges the chapter files of a book directory into one book file
///
/// Waits briefly for chapter files to become visible, merges them sorted by
/// ordinal and writes `<dir name>.<ext>` next to the directory. Formats that
/// do not keep the directory remove it afterwards.
///
/// # Arguments
///
/// * `book` - Book metadata
/// * `dir` - Book directory holding the chapter files
/// * `format` - Export format of the chapter files and the merged book
/// * `cover` - Optional cover image
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the merged book
/// * `Err(OutputError)` - No chapter files, or the book could not be written
pub fn merge_book(
    book: &Book,
    dir: &Path,
    format: ExportFormat,
    cover: Option<&CoverImage>,
) -> OutputResult<PathBuf> {
    let chapters = files::wait_for_chapter_files(
        dir,
        format,
        files::MERGE_WAIT_ATTEMPTS,
        files::MERGE_WAIT_INTERVAL,
    )?;
    let target = files::merged_file_path(dir, format)?;
    let merger = merger_for(format);

    tracing::info!(
        "Merging {} chapter files into {}",
        chapters.len(),
        target.display()
    );
    merger.merge(book, &chapters, cover, &target)?;

    if !merger.keeps_directory() {
        fs::remove_dir_all(dir)?;
        tracing::debug!("Removed working directory {}", dir.display());
    }

    Ok(target)
}
