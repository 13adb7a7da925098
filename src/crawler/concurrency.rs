//! Chapter download concurrency

use std::sync::OnceLock;

/// Ceiling on concurrent chapter downloads; sources start failing above it
pub const MAX_CONCURRENCY: usize = 6;

/// Resolves the number of concurrent chapter downloads
///
/// `threads` of `-1` or `0` selects twice the host's available parallelism.
/// The result is capped at [`MAX_CONCURRENCY`], and further at the source's
/// own ceiling when its rule declares one.
///
/// # Arguments
///
/// * `threads` - Configured `crawl.threads`
/// * `source_limit` - `max-concurrency` of the source rule, if any
///
/// # Returns
///
/// Number of chapter tasks allowed to run at once, at least 1
pub fn resolve_concurrency(threads: i32, source_limit: Option<usize>) -> usize {
    let target = if threads <= 0 {
        host_parallelism() * 2
    } else {
        threads as usize
    };

    let mut resolved = target.min(MAX_CONCURRENCY);
    if let Some(limit) = source_limit.filter(|limit| *limit > 0) {
        resolved = resolved.min(limit);
    }
    resolved.max(1)
}

fn host_parallelism() -> usize {
    static PARALLELISM: OnceLock<usize> = OnceLock::new();
    *PARALLELISM.get_or_init(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}
