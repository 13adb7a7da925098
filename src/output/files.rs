//! Per-chapter files inside a book directory
//!
//! Each converted chapter is persisted as `<NNNN>_<title>.<ext>` where the
//! prefix is the zero-padded ordinal. The merger relies on the numeric
//! prefix, not on directory order or on the title.

use crate::config::ExportFormat;
use crate::model::Chapter;
use crate::output::traits::{OutputError, OutputResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of directory polls before giving up on chapter files
pub const MERGE_WAIT_ATTEMPTS: u32 = 7;

/// Interval between directory polls
pub const MERGE_WAIT_INTERVAL: Duration = Duration::from_millis(200);

/// A persisted chapter found in a book directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterFile {
    pub chapter_no: usize,
    pub title: String,
    pub path: PathBuf,
}

impl ChapterFile {
    /// Recognizes `<digits>_<title>.<ext>` file names
    pub fn from_path(path: &Path, format: ExportFormat) -> Option<Self> {
        if path.extension()?.to_str()? != format.extension() {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let (prefix, title) = stem.split_once('_')?;
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            chapter_no: prefix.parse().ok()?,
            title: title.to_string(),
            path: path.to_path_buf(),
        })
    }

    pub fn read(&self) -> OutputResult<String> {
        Ok(fs::read_to_string(&self.path)?)
    }
}

/// Replaces characters that are invalid in file names on common platforms
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').trim();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// File name of a converted chapter
pub fn chapter_file_name(chapter_no: usize, title: &str, format: ExportFormat) -> String {
    format!(
        "{:04}_{}.{}",
        chapter_no,
        sanitize_file_name(title),
        format.extension()
    )
}

/// Writes a converted chapter into the book directory
pub fn write_chapter_file(dir: &Path, chapter: &Chapter, format: ExportFormat) -> OutputResult<PathBuf> {
    let path = dir.join(chapter_file_name(chapter.chapter_no, &chapter.title, format));
    fs::write(&path, chapter.content.as_bytes())?;
    Ok(path)
}

/// Lists chapter files of a format, sorted by ordinal
pub fn sorted_chapter_files(dir: &Path, format: ExportFormat) -> OutputResult<Vec<ChapterFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(file) = ChapterFile::from_path(&path, format) {
            files.push(file);
        }
    }
    files.sort_by_key(|file| file.chapter_no);
    Ok(files)
}

/// Polls the directory until chapter files appear
///
/// # Returns
///
/// * `Ok(files)` - Non-empty, sorted chapter files
/// * `Err(OutputError::NoChapterFiles)` - Nothing appeared within the polling window
pub fn wait_for_chapter_files(
    dir: &Path,
    format: ExportFormat,
    attempts: u32,
    interval: Duration,
) -> OutputResult<Vec<ChapterFile>> {
    for attempt in 1..=attempts.max(1) {
        let files = sorted_chapter_files(dir, format)?;
        if !files.is_empty() {
            return Ok(files);
        }
        tracing::debug!(
            "No chapter files in {} yet (poll {}/{})",
            dir.display(),
            attempt,
            attempts
        );
        if attempt < attempts {
            std::thread::sleep(interval);
        }
    }
    Err(OutputError::NoChapterFiles(dir.to_path_buf()))
}

/// Path of the merged book, beside its working directory: `<dir name>.<ext>`
pub fn merged_file_path(dir: &Path, format: ExportFormat) -> OutputResult<PathBuf> {
    let name = dir
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| OutputError::Write(format!("invalid book directory {}", dir.display())))?;
    let parent = dir.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!("{}.{}", name, format.extension())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Chapter 1: Begin?"), "Chapter 1_ Begin_");
        assert_eq!(sanitize_file_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_file_name("  ...  "), "untitled");
        assert_eq!(sanitize_file_name("第一章 开始"), "第一章 开始");
    }

    #[test]
    fn test_chapter_file_name_padding() {
        assert_eq!(chapter_file_name(7, "Seven", ExportFormat::Txt), "0007_Seven.txt");
        assert_eq!(chapter_file_name(12345, "Big", ExportFormat::Epub), "12345_Big.epub");
    }

    #[test]
    fn test_title_may_contain_underscore() {
        let file = ChapterFile::from_path(Path::new("/x/0003_a_b.html"), ExportFormat::Html).unwrap();
        assert_eq!(file.chapter_no, 3);
        assert_eq!(file.title, "a_b");
        assert!(ChapterFile::from_path(Path::new("/x/0003_a.txt"), ExportFormat::Html).is_none());
        assert!(ChapterFile::from_path(Path::new("/x/cover.html"), ExportFormat::Html).is_none());
    }

    #[test]
    fn test_sorted_by_numeric_prefix() {
        let dir = TempDir::new().unwrap();
        for (no, title) in [(10, "Ten"), (2, "Two"), (10000, "Huge"), (1, "One")] {
            let mut chapter = Chapter::new(no, title, "https://example.com");
            chapter.content = title.to_string();
            write_chapter_file(dir.path(), &chapter, ExportFormat::Txt).unwrap();
        }
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let files = sorted_chapter_files(dir.path(), ExportFormat::Txt).unwrap();
        let ordinals: Vec<_> = files.iter().map(|f| f.chapter_no).collect();
        assert_eq!(ordinals, vec![1, 2, 10, 10000]);
        assert_eq!(files[2].read().unwrap(), "Ten");
    }

    #[test]
    fn test_wait_gives_up_on_empty_directory() {
        let dir = TempDir::new().unwrap();
        let result = wait_for_chapter_files(dir.path(), ExportFormat::Txt, 2, Duration::from_millis(1));
        assert!(matches!(result, Err(OutputError::NoChapterFiles(_))));
    }

    #[test]
    fn test_merged_file_path() {
        let path = merged_file_path(Path::new("/books/Foo (Bar)"), ExportFormat::Epub).unwrap();
        assert_eq!(path, PathBuf::from("/books/Foo (Bar).epub"));
    }
}
