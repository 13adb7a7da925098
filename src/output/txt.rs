//! Plain text merger

use crate::config::ExportFormat;
use crate::model::Book;
use crate::output::files::ChapterFile;
use crate::output::traits::{BookMerger, CoverImage, OutputResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Concatenates text chapters under a short metadata header
///
/// The chapter directory is kept: its files are already readable on their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxtMerger;

impl BookMerger for TxtMerger {
    fn format(&self) -> ExportFormat {
        ExportFormat::Txt
    }

    fn merge(
        &self,
        book: &Book,
        chapters: &[ChapterFile],
        _cover: Option<&CoverImage>,
        target: &Path,
    ) -> OutputResult<()> {
        let mut out = BufWriter::new(File::create(target)?);

        writeln!(out, "{}", book.book_name)?;
        if !book.author.is_empty() {
            writeln!(out, "{}", book.author)?;
        }
        if !book.intro.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", book.intro)?;
        }
        writeln!(out)?;

        for chapter in chapters {
            let content = chapter.read()?;
            writeln!(out)?;
            out.write_all(content.trim_end().as_bytes())?;
            writeln!(out)?;
        }

        out.flush()?;
        Ok(())
    }

    fn keeps_directory(&self) -> bool {
        true
    }
}
