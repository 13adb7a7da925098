//! Shiori main entry point
//!
//! This is the command-line interface for the Shiori novel downloader.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use shiori::config::{load_config_with_hash, Settings};
use shiori::parse::ChapterRange;
use shiori::{AppContext, Crawler, RuleStore};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Shiori: a rule-driven novel downloader
///
/// Shiori searches a configured novel site, downloads every chapter of the
/// chosen book with a bounded pool of workers and merges them into a
/// single txt, html or epub file.
#[derive(Parser, Debug)]
#[command(name = "shiori")]
#[command(version = "1.0.0")]
#[command(about = "A rule-driven novel downloader", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and the selected source rule without any network access
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the configured source and list matching books
    Search {
        /// Search keyword
        keyword: String,
    },

    /// Search, pick one result and download it
    Download {
        /// Search keyword
        keyword: String,

        /// 1-based index of the search result to download
        #[arg(long, default_value_t = 1)]
        pick: usize,

        /// First chapter to download (1-based, 0 for the first)
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Last chapter to download (inclusive, 0 for the last)
        #[arg(long, default_value_t = 0)]
        end: usize,
    },

    /// List the bundled sources
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load and validate configuration
    let (settings, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    // Setup logging based on verbosity and the configured level
    setup_logging(cli.verbose, cli.quiet, &settings.base.log_level);
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if cli.dry_run {
        return handle_dry_run(&settings);
    }

    match cli.command {
        Some(Command::Search { keyword }) => handle_search(settings, &keyword).await,
        Some(Command::Download {
            keyword,
            pick,
            start,
            end,
        }) => handle_download(settings, &keyword, pick, ChapterRange::new(start, end)).await,
        Some(Command::Sources) => {
            handle_sources();
            Ok(())
        }
        None => bail!("no command given; try `search`, `download` or `sources`"),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Without `-v` the configured `log-level` applies to this crate.
fn setup_logging(verbose: u8, quiet: bool, log_level: &str) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_new(format!("shiori={},warn", log_level))
                .unwrap_or_else(|_| EnvFilter::new("shiori=info,warn")),
            1 => EnvFilter::new("shiori=debug,info"),
            2 => EnvFilter::new("shiori=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and the source rule
fn handle_dry_run(settings: &Settings) -> anyhow::Result<()> {
    println!("=== Shiori Dry Run ===\n");

    println!("Base:");
    println!("  Source id: {}", settings.base.source_id);
    println!("  Download path: {}", settings.base.download_path.display());
    println!("  Export format: {}", settings.base.export_format);

    println!("\nCrawl:");
    println!("  Threads: {}", settings.crawl.threads);
    match settings.crawl.delay_window() {
        Some((min, max)) => println!("  Request delay: {:?}..{:?}", min, max),
        None => println!("  Request delay: none"),
    }
    println!("  Timeout: {:?}", settings.crawl.timeout());

    println!("\nRetry:");
    println!(
        "  Max attempts per URL: {}",
        settings.retry.effective_max_attempts()
    );
    println!("  Backoff: {:?}", settings.retry.backoff);

    let context = AppContext::from_settings(settings);
    let rule = context
        .rules
        .get_rule(settings.base.source_id)
        .context("source rule is not usable")?;
    let crawler = Crawler::new(settings.clone(), context)?;

    println!("\nSource:");
    println!("  Site: {}", rule.url);
    if !rule.name.is_empty() {
        println!("  Name: {}", rule.name);
    }
    println!("  Search pagination: {}", rule.search.pagination);
    println!("  Chapter pagination: {}", rule.chapter.pagination);
    println!("  Chapter workers: {}", crawler.concurrency()?);

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the search command: prints numbered results
async fn handle_search(settings: Settings, keyword: &str) -> anyhow::Result<()> {
    let context = AppContext::from_settings(&settings);
    let crawler = Crawler::new(settings, context)?;

    let results = crawler.search(keyword).await?;
    if results.is_empty() {
        println!("No results for '{}'", keyword);
        return Ok(());
    }

    for (index, result) in results.iter().enumerate() {
        println!("{:>3}. {} / {}", index + 1, result.book_name, result.author);
        if !result.latest_chapter.is_empty() {
            println!("     latest: {} {}", result.latest_chapter, result.latest_update);
        }
        println!("     {}", result.url);
    }
    Ok(())
}

/// Handles the download command: search, pick, crawl and report progress
async fn handle_download(
    settings: Settings,
    keyword: &str,
    pick: usize,
    range: ChapterRange,
) -> anyhow::Result<()> {
    let context = AppContext::from_settings(&settings);
    let crawler = Crawler::new(settings, context)?;

    let results = crawler.search(keyword).await?;
    if results.is_empty() {
        bail!("no results for '{}'", keyword);
    }
    let selected = pick
        .checked_sub(1)
        .and_then(|index| results.get(index))
        .cloned()
        .with_context(|| format!("--pick {} is out of range 1..={}", pick, results.len()))?;

    tracing::info!(
        "Downloading {} by {} from {}",
        selected.book_name,
        selected.author,
        selected.url
    );

    let key = selected.url.clone();
    let task = crawler.spawn_crawl(selected, range);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    while !task.is_finished() {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, stopping after running chapters finish");
                task.cancel();
            }
        }
        if let Some(snapshot) = crawler.get_progress(&key) {
            tracing::info!(
                "Progress: {}/{} ({:.1}%)",
                snapshot.completed,
                snapshot.total,
                snapshot.percent()
            );
        }
    }

    match task.join().await? {
        Some(result) => {
            println!("✓ Saved {}", result.output_path.display());
            println!(
                "  {} chapters in {}s",
                result.chapter_count, result.take_time_secs
            );
            if !result.is_complete() {
                println!("  Failed chapters: {:?}", result.failed_chapters);
            }
        }
        None => println!("The catalog is empty, nothing was downloaded"),
    }
    Ok(())
}

/// Handles the sources command
fn handle_sources() {
    println!("Bundled sources:");
    for (id, url) in RuleStore::bundled_sources() {
        println!("  {:>3}  {}", id, url);
    }
}
