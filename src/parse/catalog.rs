//! Chapter catalog parser
//!
//! Ordinals are assigned here, once, in first-seen order. Nothing after
//! this point renumbers a chapter; the download range is applied to the
//! numbered list so that `start..=end` always refers to catalog positions.

use crate::fetch::Fetcher;
use crate::model::Chapter;
use crate::parse::common::{capture_group1, compile_selector, element_text, resolve_link};
use crate::rules::Rule;
use crate::{Result, ShioriError};
use scraper::Html;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use url::Url;

/// Inclusive, 1-based selection of catalog positions
///
/// `0` on either side means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChapterRange {
    pub start: usize,
    pub end: usize,
}

impl ChapterRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The whole catalog
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, chapter_no: usize) -> bool {
        chapter_no >= self.start.max(1) && (self.end == 0 || chapter_no <= self.end)
    }
}

/// Resolves the URL of the chapter list page
///
/// Sources whose catalog lives on its own page declare a template with an
/// `{id}` placeholder; the id is the first capture group of the book URL
/// pattern. Otherwise the book page itself holds the catalog.
pub fn catalog_url(rule: &Rule, book_url: &str) -> Result<String> {
    let template = rule.catalog.url.trim();
    if template.is_empty() {
        return Ok(book_url.to_string());
    }

    let id = capture_group1(&rule.book.url, book_url)?.ok_or_else(|| ShioriError::Extraction {
        url: book_url.to_string(),
        message: "book URL does not match the rule's book pattern".to_string(),
    })?;
    Ok(template.replace("{id}", &id))
}

/// Fetches and parses the catalog of a book
///
/// # Returns
///
/// * `Ok(chapters)` - Chapters in ordinal order, restricted to `range`; may be empty
/// * `Err(ShioriError)` - The catalog page could not be fetched or the rule is invalid
pub async fn fetch_catalog(
    fetcher: &Fetcher,
    rule: &Rule,
    book_url: &str,
    range: ChapterRange,
) -> Result<Vec<Chapter>> {
    let url = catalog_url(rule, book_url)?;
    let page = fetcher.session().get_text(&url).await?.into_result()?;
    let chapters = parse_catalog(&page.body, rule)?;
    let total = chapters.len();

    let selected: Vec<Chapter> = chapters
        .into_iter()
        .filter(|chapter| range.contains(chapter.chapter_no))
        .collect();
    tracing::info!(
        "Catalog {} lists {} chapters, {} selected",
        url,
        total,
        selected.len()
    );
    Ok(selected)
}

/// Reads the ordered chapter list of a catalog page
///
/// Entries are deduplicated by title: the first occurrence fixes the
/// ordinal and a later occurrence with the same title replaces its link.
pub fn parse_catalog(html: &str, rule: &Rule) -> Result<Vec<Chapter>> {
    let base_url = Url::parse(&rule.url)?;
    let selector = compile_selector(&rule.catalog.result)?;
    let document = Html::parse_document(html);

    let mut chapters: Vec<Chapter> = Vec::new();
    let mut by_title: HashMap<String, usize> = HashMap::new();

    for link in document.select(&selector) {
        let title = element_text(link);
        let Some(url) = link
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, &base_url))
        else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        match by_title.entry(title) {
            Entry::Occupied(entry) => chapters[*entry.get()].url = url,
            Entry::Vacant(entry) => {
                let index = chapters.len();
                chapters.push(Chapter::new(index + 1, entry.key().clone(), url));
                entry.insert(index);
            }
        }
    }

    Ok(chapters)
}
