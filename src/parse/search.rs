//! Search result parser
//!
//! Queries the source with a keyword and reads one [`SearchResult`] per
//! result row. When the rule declares search pagination, the page links
//! found on the first page are fetched concurrently and their results are
//! appended after the first page, in link discovery order.

use crate::fetch::Fetcher;
use crate::model::SearchResult;
use crate::parse::common::{collect_links, compile_optional, compile_selector, resolve_link, FieldSelector};
use crate::rules::{HttpMethod, Rule};
use crate::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use scraper::{ElementRef, Html};
use url::Url;

/// Results and pagination links read from one search page
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub results: Vec<SearchResult>,
    /// Absolute URLs of further result pages
    pub next_pages: Vec<String>,
}

/// Runs a search against the rule's source
///
/// # Arguments
///
/// * `fetcher` - Session factory of the current crawler
/// * `rule` - Rule of the configured source
/// * `keyword` - Search keyword, substituted into URL or form body
/// * `concurrency` - Ceiling on concurrently fetched result pages
///
/// # Returns
///
/// * `Ok(Vec<SearchResult>)` - All results, possibly empty
/// * `Err(ShioriError)` - A page could not be fetched or the rule is invalid
pub async fn search(
    fetcher: &Fetcher,
    rule: &Rule,
    keyword: &str,
    concurrency: usize,
) -> Result<Vec<SearchResult>> {
    let search = &rule.search;
    let cookie = search.cookie_header();
    let session = fetcher.session_with_cookie(cookie.clone());
    let first_url = search.search_url(keyword);

    tracing::info!("Searching '{}' on {}", keyword, rule.url);
    let page = match search.method {
        HttpMethod::Get => session.get_text(&first_url).await?,
        HttpMethod::Post => session.post_form(&first_url, search.form_body(keyword)).await?,
    }
    .into_result()?;

    let first = parse_search_page(&page.body, rule)?;
    if first.results.is_empty() || !search.pagination {
        return Ok(first.results);
    }

    let followups: Vec<String> = first
        .next_pages
        .into_iter()
        .filter(|link| *link != first_url && *link != page.url.as_str())
        .collect();
    tracing::debug!("Following {} search result pages", followups.len());

    let pages: Vec<Vec<SearchResult>> = stream::iter(followups)
        .map(|link| {
            let cookie = cookie.clone();
            async move {
                let page = fetcher
                    .session_with_cookie(cookie)
                    .get_text(&link)
                    .await?
                    .into_result()?;
                parse_search_page(&page.body, rule).map(|parsed| parsed.results)
            }
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut results = first.results;
    results.extend(pages.into_iter().flatten());
    Ok(results)
}

/// Reads the result rows and pagination links of one search page
///
/// Rows without a book name are skipped. Relative links are resolved
/// against the rule's base URL.
pub fn parse_search_page(html: &str, rule: &Rule) -> Result<SearchPage> {
    let search = &rule.search;
    let base_url = Url::parse(&rule.url)?;

    let row_selector = compile_selector(&search.result)?;
    let name_field = FieldSelector::parse(&search.book_name)?;
    let author_field = FieldSelector::parse(&search.author)?;
    let latest_field = FieldSelector::parse(&search.latest_chapter)?;
    let update_field = FieldSelector::parse(&search.update)?;

    let document = Html::parse_document(html);
    let mut page = SearchPage::default();

    let Some(name_field) = name_field else {
        return Ok(page);
    };

    for row in document.select(&row_selector) {
        let Some(link) = row.select(name_field.selector()).next() else {
            continue;
        };
        let Some(book_name) = name_field.read(link) else {
            continue;
        };
        let Some(url) = link
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, &base_url))
        else {
            tracing::debug!("Skipping search result '{}' without a link", book_name);
            continue;
        };

        page.results.push(SearchResult {
            url,
            book_name,
            author: read_field(&author_field, row),
            latest_chapter: read_field(&latest_field, row),
            latest_update: read_field(&update_field, row),
        });
    }

    if search.pagination {
        if let Some(next_selector) = compile_optional(&search.next_page)? {
            for link in collect_links(&document, &next_selector, &base_url) {
                if !page.next_pages.contains(&link) {
                    page.next_pages.push(link);
                }
            }
        }
    }

    Ok(page)
}

fn read_field(field: &Option<FieldSelector>, row: ElementRef<'_>) -> String {
    field
        .as_ref()
        .and_then(|f| f.extract(row))
        .unwrap_or_default()
}
