//! Records passed between the parsers, the crawler and the output stage

use std::path::PathBuf;

/// One candidate book returned by a search
///
/// The URL is the stable identity used by every later phase and as the
/// progress task key of a crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub url: String,
    pub book_name: String,
    pub author: String,
    pub latest_chapter: String,
    pub latest_update: String,
}

/// Book metadata, fetched once per crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
    pub book_name: String,
    pub author: String,
    pub intro: String,
    pub cover_url: String,
}

impl Book {
    /// Name of the per-book directory: `"<BookName> (<Author>)"`
    pub fn directory_name(&self) -> String {
        format!("{} ({})", self.book_name, self.author)
    }
}

/// One catalog entry
///
/// `chapter_no` is assigned once, in first-seen catalog order, and never
/// changes afterwards. `content` goes from empty to raw HTML to the
/// rendered export text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub chapter_no: usize,
    pub title: String,
    pub url: String,
    pub content: String,
}

impl Chapter {
    pub fn new(chapter_no: usize, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            chapter_no,
            title: title.into(),
            url: url.into(),
            content: String::new(),
        }
    }
}

/// Terminal outcome of a successful crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlResult {
    /// Path of the merged book file
    pub output_path: PathBuf,

    /// Whole seconds spent downloading and merging
    pub take_time_secs: u64,

    /// Chapters scheduled for download
    pub chapter_count: usize,

    /// Ordinals of chapters whose download or conversion failed
    pub failed_chapters: Vec<usize>,
}

impl CrawlResult {
    pub fn is_complete(&self) -> bool {
        self.failed_chapters.is_empty()
    }
}
