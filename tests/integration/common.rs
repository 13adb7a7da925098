//! Stub site and settings helpers shared by the integration tests

use shiori::config::{ExportFormat, Settings};
use shiori::{AppContext, Crawler, RuleStore, SearchResult};
use std::path::Path;
use wiremock::MockServer;

/// Source id the stub rule is registered under
pub const STUB_SOURCE: u32 = 42;

/// GET-search rule for the stub site; `{base}` is the mock server URI
const STUB_RULE: &str = r##"{
    "url": "{base}",
    "name": "Stub site",
    "search": {
        "url": "{base}/search?q={keyword}",
        "result": "ul.results > li",
        "book-name": "a.name",
        "author": "span.author",
        "latest-chapter": "span.latest",
        "pagination": true,
        "next-page": "div.pages > a"
    },
    "book": {
        "url": "/book/(\\d+)/",
        "book-name": "h1",
        "author": "p.author",
        "intro": "div.intro",
        "cover-url": "img.cover@src"
    },
    "catalog": {
        "result": "#list a"
    },
    "chapter": {
        "content": "#content",
        "filter-tag": ["p.ad"]
    }
}"##;

/// POST-search rule with static cookies
const POST_RULE: &str = r##"{
    "url": "{base}",
    "search": {
        "url": "{base}/modules/search.php",
        "method": "post",
        "body": "searchkey={keyword}&type=all",
        "cookies": {"lang": "en"},
        "result": "ul.results > li",
        "book-name": "a.name",
        "author": "span.author"
    },
    "book": {"book-name": "h1"},
    "catalog": {"result": "#list a"},
    "chapter": {"content": "#content"}
}"##;

/// Source id of [`POST_RULE`]
pub const POST_SOURCE: u32 = 43;

/// Context whose rules point at the mock server
pub fn stub_context(server: &MockServer) -> AppContext {
    let base = server.uri();
    AppContext::new(RuleStore::from_documents([
        (STUB_SOURCE, STUB_RULE.replace("{base}", &base)),
        (POST_SOURCE, POST_RULE.replace("{base}", &base)),
    ]))
}

/// Settings with fast retries and no request spacing
pub fn stub_settings(source_id: u32, download_path: &Path, format: ExportFormat) -> Settings {
    let mut settings = Settings::new(source_id, download_path, format);
    settings.crawl.threads = 3;
    settings.crawl.min_delay_ms = 0;
    settings.crawl.max_delay_ms = 0;
    settings.crawl.timeout_secs = 5;
    settings.retry.max_attempts = 3;
    settings.retry.base_delay_ms = 1;
    settings.retry.max_delay_ms = 5;
    settings
}

pub fn stub_crawler(server: &MockServer, download_path: &Path, format: ExportFormat) -> Crawler {
    let settings = stub_settings(STUB_SOURCE, download_path, format);
    Crawler::new(settings, stub_context(server)).unwrap()
}

/// Search result pointing at the stub book page
pub fn stub_result(server: &MockServer) -> SearchResult {
    SearchResult {
        url: format!("{}/book/1/", server.uri()),
        book_name: "Foo".to_string(),
        author: "Bar".to_string(),
        latest_chapter: String::new(),
        latest_update: String::new(),
    }
}

/// Book page with metadata and a catalog of `chapters` entries
pub fn book_page(chapters: &[(usize, &str)]) -> String {
    let links: String = chapters
        .iter()
        .map(|(no, title)| format!(r#"<dd><a href="/book/1/{}.html">{}</a></dd>"#, no, title))
        .collect();
    format!(
        r#"<html><body>
            <h1>Foo</h1>
            <p class="author">Bar</p>
            <div class="intro">A quiet   story.</div>
            <img class="cover" src="/cover.png">
            <dl id="list">{}</dl>
        </body></html>"#,
        links
    )
}

/// Chapter page whose content holds one paragraph and an ad
pub fn chapter_page(text: &str) -> String {
    format!(
        r#"<html><body><div id="content"><p>{}</p><p class="ad">BUY NOW</p></div></body></html>"#,
        text
    )
}

/// Smallest valid PNG signature followed by filler
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 16]);
    bytes
}
