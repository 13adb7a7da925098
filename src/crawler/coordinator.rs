//! Crawl coordinator - drives one book from search result to merged file
//!
//! This module contains the crawl pipeline that coordinates:
//! - Resolving book metadata and creating the book directory
//! - Parsing the catalog and fixing chapter ordinals
//! - Fanning chapters out to a bounded pool of fetch sessions
//! - Reporting progress under the book URL
//! - Merging chapter files into the export format

use crate::config::{ExportFormat, Settings};
use crate::crawler::concurrency::resolve_concurrency;
use crate::crawler::phase::{CrawlPhase, PhaseTracker};
use crate::fetch::{build_http_client, Fetcher, RetryRegistry};
use crate::model::{Book, Chapter, CrawlResult, SearchResult};
use crate::output::{merge_book, sanitize_file_name, write_chapter_file, Converter, CoverImage};
use crate::parse::{self, ChapterRange};
use crate::progress::{BackgroundTask, ProgressSnapshot, ProgressTracker};
use crate::rules::{Rule, RuleStore};
use crate::{Result, ShioriError};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Registries shared by every crawl of one application context
///
/// Each field is an explicitly owned instance; tests build their own
/// context so parallel tests never observe each other's state.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    pub rules: Arc<RuleStore>,
    pub retries: Arc<RetryRegistry>,
    pub progress: Arc<ProgressTracker>,
}

impl AppContext {
    /// Context with the given rules and fresh retry and progress registries
    pub fn new(rules: RuleStore) -> Self {
        Self {
            rules: Arc::new(rules),
            retries: Arc::new(RetryRegistry::new()),
            progress: Arc::new(ProgressTracker::new()),
        }
    }

    /// Context backed by the rules compiled into the binary
    pub fn bundled() -> Self {
        Self::new(RuleStore::bundled())
    }

    /// Context reading rules from `[rules] directory` when configured
    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.rules.directory {
            Some(dir) => Self::new(RuleStore::from_dir(dir)),
            None => Self::bundled(),
        }
    }
}

/// Everything a chapter task needs, shared by all tasks of a crawl
struct ChapterJob {
    fetcher: Fetcher,
    rule: Arc<Rule>,
    converter: Converter,
    dir: PathBuf,
    permits: Semaphore,
    token: CancellationToken,
}

/// Main crawl orchestrator
#[derive(Clone)]
pub struct Crawler {
    settings: Arc<Settings>,
    context: AppContext,
    fetcher: Fetcher,
}

impl Crawler {
    /// Creates a crawler for one settings snapshot
    ///
    /// # Arguments
    ///
    /// * `settings` - Settings snapshot; never mutated by the crawler
    /// * `context` - Shared rule, retry and progress registries
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready crawler; the source rule is loaded eagerly
    /// * `Err(ShioriError)` - Unknown source id, bad rule, or HTTP client failure
    pub fn new(settings: Settings, context: AppContext) -> Result<Self> {
        context.rules.get_rule(settings.base.source_id)?;
        let client = build_http_client(settings.crawl.timeout())?;
        let fetcher = Fetcher::new(client, Arc::clone(&context.retries), &settings);

        Ok(Self {
            settings: Arc::new(settings),
            context,
            fetcher,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Rule of the configured source
    pub fn rule(&self) -> Result<Arc<Rule>> {
        Ok(self.context.rules.get_rule(self.settings.base.source_id)?)
    }

    /// Number of chapter tasks allowed to run at once for this source
    pub fn concurrency(&self) -> Result<usize> {
        let rule = self.rule()?;
        Ok(resolve_concurrency(
            self.settings.crawl.threads,
            rule.max_concurrency,
        ))
    }

    /// Searches the configured source for a keyword
    pub async fn search(&self, keyword: &str) -> Result<Vec<SearchResult>> {
        let rule = self.rule()?;
        let concurrency = resolve_concurrency(self.settings.crawl.threads, rule.max_concurrency);
        parse::search(&self.fetcher, &rule, keyword, concurrency).await
    }

    /// Crawls a selected search result into a merged book
    ///
    /// `start` and `end` select chapters by 1-based ordinal, inclusive;
    /// `0` leaves that side unbounded.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(CrawlResult))` - The merged book was written
    /// * `Ok(None)` - The catalog listed no chapters; nothing was merged
    /// * `Err(ShioriError)` - A phase-level failure aborted the crawl
    pub async fn crawl(
        &self,
        result: &SearchResult,
        start: usize,
        end: usize,
    ) -> Result<Option<CrawlResult>> {
        self.crawl_with_cancel(result, ChapterRange::new(start, end), CancellationToken::new())
            .await
    }

    /// Crawls a search result, stopping early once `token` is cancelled
    ///
    /// Chapters that have not started when the token fires are skipped but
    /// still counted toward progress; the crawl then fails with
    /// [`ShioriError::Cancelled`] instead of merging.
    pub async fn crawl_with_cancel(
        &self,
        result: &SearchResult,
        range: ChapterRange,
        token: CancellationToken,
    ) -> Result<Option<CrawlResult>> {
        let mut phase = PhaseTracker::new(&result.url);
        let outcome = self.run(result, range, token, &mut phase).await;
        if let Err(e) = &outcome {
            tracing::error!("Crawl of {} failed: {}", result.url, e);
            phase.fail();
        }
        outcome
    }

    /// Starts a crawl in the background
    ///
    /// Progress is reported under the result URL; poll it with
    /// [`Crawler::get_progress`] and stop the crawl with
    /// [`BackgroundTask::cancel`].
    pub fn spawn_crawl(
        &self,
        result: SearchResult,
        range: ChapterRange,
    ) -> BackgroundTask<Option<CrawlResult>> {
        let crawler = self.clone();
        let key = result.url.clone();
        BackgroundTask::spawn(key, move |token| async move {
            crawler.crawl_with_cancel(&result, range, token).await
        })
    }

    pub fn get_progress(&self, key: &str) -> Option<ProgressSnapshot> {
        self.context.progress.get_progress(key)
    }

    async fn run(
        &self,
        result: &SearchResult,
        range: ChapterRange,
        token: CancellationToken,
        phase: &mut PhaseTracker,
    ) -> Result<Option<CrawlResult>> {
        let rule = self.rule()?;
        let key = result.url.as_str();
        let format = self.settings.base.export_format;
        let progress = &self.context.progress;

        // Book metadata and directory
        let book = parse::fetch_book(&self.fetcher, &rule, &result.url).await?;
        let dir = self
            .settings
            .base
            .download_path
            .join(sanitize_file_name(&book.directory_name()));
        tokio::fs::create_dir_all(&dir).await?;
        phase.advance(CrawlPhase::BookFetched)?;

        // Catalog
        let chapters = parse::fetch_catalog(&self.fetcher, &rule, &result.url, range).await?;
        phase.advance(CrawlPhase::CatalogFetched)?;
        if chapters.is_empty() {
            tracing::warn!("Catalog of {} is empty, nothing to download", book.book_name);
            phase.advance(CrawlPhase::Empty)?;
            return Ok(None);
        }

        let chapter_count = chapters.len();
        progress.init_task(key, chapter_count as u64 + 1);
        let started = Instant::now();
        phase.advance(CrawlPhase::Downloading)?;

        let concurrency = resolve_concurrency(self.settings.crawl.threads, rule.max_concurrency);
        tracing::info!(
            "Downloading {} chapters of {} with {} workers",
            chapter_count,
            book.book_name,
            concurrency
        );

        let job = Arc::new(ChapterJob {
            fetcher: self.fetcher.clone(),
            converter: Converter::from_rule(format, &rule.chapter)?,
            rule: Arc::clone(&rule),
            dir: dir.clone(),
            permits: Semaphore::new(concurrency),
            token: token.clone(),
        });
        let failed_chapters = download_all(job, chapters, progress, key).await;

        if token.is_cancelled() {
            return Err(ShioriError::Cancelled);
        }
        if !failed_chapters.is_empty() {
            tracing::warn!(
                "{} of {} chapters failed: {:?}",
                failed_chapters.len(),
                chapter_count,
                failed_chapters
            );
        }

        // Merge
        phase.advance(CrawlPhase::Merging)?;
        let cover = if format == ExportFormat::Epub {
            self.fetch_cover(&book).await
        } else {
            None
        };
        let output_path = merge_in_background(book, dir, format, cover).await?;
        progress.advance(key, 1);
        phase.advance(CrawlPhase::Done)?;

        let take_time_secs = started.elapsed().as_secs();
        tracing::info!(
            "Wrote {} in {}s",
            output_path.display(),
            take_time_secs
        );

        Ok(Some(CrawlResult {
            output_path,
            take_time_secs,
            chapter_count,
            failed_chapters,
        }))
    }

    /// Fetches the cover image; any failure leaves the book without one
    async fn fetch_cover(&self, book: &Book) -> Option<CoverImage> {
        if book.cover_url.is_empty() {
            return None;
        }
        match self.fetcher.session().get_bytes(&book.cover_url).await {
            Ok(outcome) => outcome
                .ok()
                .filter(|bytes| !bytes.is_empty())
                .map(|bytes| CoverImage::new(bytes, &book.cover_url)),
            Err(e) => {
                tracing::warn!("Skipping cover {}: {}", book.cover_url, e);
                None
            }
        }
    }
}

/// Runs every chapter task and returns the ordinals that did not finish
///
/// Progress advances once per joined task, whatever its outcome, so the
/// counter always reaches the chapter count.
async fn download_all(
    job: Arc<ChapterJob>,
    chapters: Vec<Chapter>,
    progress: &ProgressTracker,
    key: &str,
) -> Vec<usize> {
    let mut pending: BTreeSet<usize> = chapters.iter().map(|c| c.chapter_no).collect();
    let mut tasks = JoinSet::new();

    for chapter in chapters {
        let job = Arc::clone(&job);
        tasks.spawn(async move {
            let chapter_no = chapter.chapter_no;
            (chapter_no, download_one(&job, chapter).await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((chapter_no, Ok(()))) => {
                pending.remove(&chapter_no);
            }
            Ok((chapter_no, Err(ShioriError::Cancelled))) => {
                tracing::debug!("Chapter {} skipped after cancellation", chapter_no);
            }
            Ok((chapter_no, Err(e))) => {
                tracing::warn!("Chapter {} failed: {}", chapter_no, e);
            }
            Err(e) => {
                tracing::error!("Chapter task aborted: {}", e);
            }
        }
        progress.advance(key, 1);
    }

    pending.into_iter().collect()
}

/// Fetches, converts and persists one chapter
///
/// A chapter whose fetch fails still gets a title-only file so the merged
/// book keeps one section per ordinal; the fetch error is returned after
/// the file is written.
async fn download_one(job: &ChapterJob, mut chapter: Chapter) -> Result<()> {
    let _permit = job
        .permits
        .acquire()
        .await
        .map_err(|e| ShioriError::Task(e.to_string()))?;
    if job.token.is_cancelled() {
        return Err(ShioriError::Cancelled);
    }

    let fetched =
        parse::download_chapter(&job.fetcher, &job.rule, &job.converter, &mut chapter).await;
    if fetched.is_err() && chapter.content.is_empty() {
        chapter.content = job.converter.convert(&chapter.title, "");
    }

    let dir = job.dir.clone();
    let format = job.converter.format();
    let chapter_no = chapter.chapter_no;
    let path = tokio::task::spawn_blocking(move || write_chapter_file(&dir, &chapter, format))
        .await
        .map_err(|e| ShioriError::Task(e.to_string()))??;
    tracing::debug!("Chapter {} saved to {}", chapter_no, path.display());

    fetched
}

/// Merges on the blocking pool; the merger polls and writes synchronously
async fn merge_in_background(
    book: Book,
    dir: PathBuf,
    format: ExportFormat,
    cover: Option<CoverImage>,
) -> Result<PathBuf> {
    let merged = tokio::task::spawn_blocking(move || {
        merge_book(&book, &dir, format, cover.as_ref())
    })
    .await
    .map_err(|e| ShioriError::Task(e.to_string()))??;
    Ok(merged)
}
