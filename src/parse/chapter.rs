//! Chapter content parser
//!
//! Collects the content fragment of a chapter, following the rule's
//! "next page" link across split pages when the source paginates chapters.
//! Following stops when:
//! - the next link is missing or its text is a stop marker (for example `下一章`)
//! - the link points at a page already visited
//! - [`MAX_CHAPTER_PAGES`] pages have been read

use crate::fetch::Fetcher;
use crate::model::Chapter;
use crate::output::Converter;
use crate::parse::common::{compile_optional, compile_selector, element_text, resolve_link};
use crate::rules::Rule;
use crate::Result;
use scraper::Html;
use std::collections::HashSet;
use url::Url;

/// Upper bound on pages read for a single chapter
pub const MAX_CHAPTER_PAGES: usize = 50;

/// Content and continuation link of one chapter page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterPage {
    /// Inner HTML of every content match, concatenated
    pub fragment: String,
    pub next_page: Option<String>,
}

/// Downloads a chapter and stores its converted content
///
/// On success `chapter.content` holds the rendered export text.
pub async fn download_chapter(
    fetcher: &Fetcher,
    rule: &Rule,
    converter: &Converter,
    chapter: &mut Chapter,
) -> Result<()> {
    let html = fetch_chapter_html(fetcher, rule, &chapter.url).await?;
    chapter.content = converter.convert(&chapter.title, &html);
    Ok(())
}

/// Fetches the raw content HTML of a chapter across all of its pages
pub async fn fetch_chapter_html(fetcher: &Fetcher, rule: &Rule, url: &str) -> Result<String> {
    let session = fetcher.session();
    let mut visited = HashSet::new();
    let mut content = String::new();
    let mut next = Some(url.to_string());

    while let Some(page_url) = next.take() {
        if visited.len() >= MAX_CHAPTER_PAGES {
            tracing::warn!(
                "Chapter {} exceeds {} pages, truncating",
                url,
                MAX_CHAPTER_PAGES
            );
            break;
        }
        if !visited.insert(page_url.clone()) {
            tracing::debug!("Chapter page {} already visited", page_url);
            break;
        }

        let page = session.get_text(&page_url).await?.into_result()?;
        let parsed = parse_chapter_page(&page.body, rule)?;
        content.push_str(&parsed.fragment);
        next = parsed.next_page;
    }

    Ok(content)
}

/// Reads the content fragment and the continuation link of one page
pub fn parse_chapter_page(html: &str, rule: &Rule) -> Result<ChapterPage> {
    let chapter_rule = &rule.chapter;
    let content_selector = compile_selector(&chapter_rule.content)?;
    let document = Html::parse_document(html);

    let fragment = document
        .select(&content_selector)
        .map(|element| element.inner_html())
        .collect::<String>();

    let next_page = if chapter_rule.pagination {
        match compile_optional(&chapter_rule.next_page)? {
            Some(selector) => {
                let base_url = Url::parse(&rule.url)?;
                document.select(&selector).next().and_then(|link| {
                    let text = element_text(link);
                    if chapter_rule
                        .next_page_stop
                        .iter()
                        .any(|stop| !stop.is_empty() && text.contains(stop.as_str()))
                    {
                        return None;
                    }
                    link.value()
                        .attr("href")
                        .and_then(|href| resolve_link(href, &base_url))
                })
            }
            None => None,
        }
    } else {
        None
    };

    Ok(ChapterPage {
        fragment,
        next_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExportFormat, Settings};
    use crate::fetch::{build_http_client, RetryRegistry};
    use crate::RuleStore;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGED_RULE: &str = r##"{
        "url": "{base}",
        "search": {"url": "{base}/search?q={keyword}", "result": "li", "book-name": "a"},
        "book": {"book-name": "h1"},
        "catalog": {"result": "#list a"},
        "chapter": {
            "content": "#content",
            "pagination": true,
            "next-page": "a.next",
            "next-page-stop": ["Next chapter"]
        }
    }"##;

    fn paged_rule(server: &MockServer) -> Arc<Rule> {
        RuleStore::from_documents([(7, PAGED_RULE.replace("{base}", &server.uri()))])
            .get_rule(7)
            .unwrap()
    }

    fn paged_fetcher() -> Fetcher {
        let mut settings = Settings::new(7, "downloads", ExportFormat::Txt);
        settings.crawl.min_delay_ms = 0;
        settings.crawl.max_delay_ms = 0;
        settings.retry.max_attempts = 1;
        let client = build_http_client(Duration::from_secs(5)).unwrap();
        Fetcher::new(client, Arc::new(RetryRegistry::new()), &settings)
    }

    fn paged_body(text: &str, next: Option<&str>) -> String {
        let link = next
            .map(|href| format!(r#"<a class="next" href="{}">Next page</a>"#, href))
            .unwrap_or_default();
        format!(r#"<div id="content"><p>{}</p></div>{}"#, text, link)
    }

    async fn mount_page(server: &MockServer, route: &str, body: String, calls: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_split_pages_concatenated_in_order() {
        let server = MockServer::start().await;
        mount_page(&server, "/c/1", paged_body("one", Some("/c/1_2")), 1).await;
        mount_page(&server, "/c/1_2", paged_body("two", Some("/c/1_3")), 1).await;
        mount_page(&server, "/c/1_3", paged_body("three", None), 1).await;

        let rule = paged_rule(&server);
        let html = fetch_chapter_html(&paged_fetcher(), &rule, &format!("{}/c/1", server.uri()))
            .await
            .unwrap();

        assert_eq!(html, "<p>one</p><p>two</p><p>three</p>");
    }

    #[tokio::test]
    async fn test_self_link_fetched_once() {
        let server = MockServer::start().await;
        mount_page(&server, "/c/1", paged_body("loop", Some("/c/1")), 1).await;

        let rule = paged_rule(&server);
        let html = fetch_chapter_html(&paged_fetcher(), &rule, &format!("{}/c/1", server.uri()))
            .await
            .unwrap();

        assert_eq!(html, "<p>loop</p>");
    }

    #[tokio::test]
    async fn test_long_chain_capped_at_page_limit() {
        let server = MockServer::start().await;
        let chain = MAX_CHAPTER_PAGES + 10;
        for no in 1..=chain {
            let next = format!("/c/{}", no + 1);
            let calls = if no <= MAX_CHAPTER_PAGES { 1 } else { 0 };
            mount_page(&server, &format!("/c/{}", no), paged_body("x", Some(&next)), calls).await;
        }

        let rule = paged_rule(&server);
        let html = fetch_chapter_html(&paged_fetcher(), &rule, &format!("{}/c/1", server.uri()))
            .await
            .unwrap();

        assert_eq!(html.matches("<p>x</p>").count(), MAX_CHAPTER_PAGES);
        assert_eq!(server.received_requests().await.unwrap().len(), MAX_CHAPTER_PAGES);
    }

    #[test]
    fn test_single_page_fragment() {
        let rule = RuleStore::bundled().get_rule(1).unwrap();
        let html = r#"<html><body><div id="content"><p>one</p><p>two</p></div></body></html>"#;

        let page = parse_chapter_page(html, &rule).unwrap();
        assert_eq!(page.fragment, "<p>one</p><p>two</p>");
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn test_next_page_followed() {
        let rule = RuleStore::bundled().get_rule(2).unwrap();
        let html = r#"
            <div class="txtnav">part one</div>
            <div class="page1"><a href="/txt/1/10.htm">上一章</a><a href="/txt/1/11_2.htm">下一页</a></div>
        "#;

        let page = parse_chapter_page(html, &rule).unwrap();
        assert_eq!(page.fragment, "part one");
        assert_eq!(
            page.next_page.as_deref(),
            Some("https://www.69-style.example/txt/1/11_2.htm")
        );
    }

    #[test]
    fn test_stop_text_ends_chapter() {
        let rule = RuleStore::bundled().get_rule(2).unwrap();
        let html = r#"
            <div class="txtnav">last part</div>
            <div class="page1"><a href="/txt/1/11_2.htm">上一页</a><a href="/txt/1/12.htm">下一章</a></div>
        "#;

        let page = parse_chapter_page(html, &rule).unwrap();
        assert_eq!(page.next_page, None);
    }
}
