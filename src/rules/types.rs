use serde::Deserialize;
use std::collections::BTreeMap;

/// Declarative extraction rule for one source site
///
/// Rules are immutable once loaded. Field selectors use plain CSS; a
/// trailing `@attr` selects an attribute instead of the element text
/// (for example `meta[property="og:title"]@content`).
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    /// Base site URL used to resolve relative links
    pub url: String,

    /// Human-readable source name
    #[serde(default)]
    pub name: String,

    /// Hard ceiling on concurrent chapter downloads for this site
    #[serde(rename = "max-concurrency", default)]
    pub max_concurrency: Option<usize>,

    pub search: SearchRule,
    pub book: BookRule,
    pub catalog: CatalogRule,
    pub chapter: ChapterRule,
}

/// How to query the site and read the results page
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRule {
    /// Search URL; `{keyword}` is substituted when present
    pub url: String,

    #[serde(default)]
    pub method: HttpMethod,

    /// Form body template for POST searches; `{keyword}` is substituted
    #[serde(default)]
    pub body: String,

    /// Static cookies sent with every search request
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,

    /// Selector matching one result row
    pub result: String,

    /// Selector (relative to the row) of the book link; its text is the name
    #[serde(rename = "book-name")]
    pub book_name: String,

    #[serde(default)]
    pub author: String,

    #[serde(rename = "latest-chapter", default)]
    pub latest_chapter: String,

    #[serde(default)]
    pub update: String,

    #[serde(default)]
    pub pagination: bool,

    #[serde(rename = "next-page", default)]
    pub next_page: String,
}

/// How to read book metadata from the book page
#[derive(Debug, Clone, Deserialize)]
pub struct BookRule {
    /// Regex matching a book URL; the first capture group is the book id
    #[serde(default)]
    pub url: String,

    #[serde(rename = "book-name")]
    pub book_name: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub intro: String,

    #[serde(rename = "cover-url", default)]
    pub cover_url: String,
}

/// How to locate and read the chapter list
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRule {
    /// Catalog URL template with an `{id}` placeholder; the book URL is used when empty
    #[serde(default)]
    pub url: String,

    /// Selector matching one chapter link
    pub result: String,
}

/// How to read chapter content
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterRule {
    /// Selector of the content container
    pub content: String,

    #[serde(default)]
    pub pagination: bool,

    #[serde(rename = "next-page", default)]
    pub next_page: String,

    /// Link text that marks the last page of a chapter
    #[serde(rename = "next-page-stop", default = "default_next_page_stop")]
    pub next_page_stop: Vec<String>,

    /// Selectors of boilerplate elements removed from the content
    #[serde(rename = "filter-tag", default)]
    pub filter_tag: Vec<String>,

    /// Regexes of boilerplate text removed from each paragraph
    #[serde(rename = "filter-txt", default)]
    pub filter_txt: Vec<String>,
}

/// HTTP method used for the search request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

fn default_next_page_stop() -> Vec<String> {
    vec!["下一章".to_string(), "Next Chapter".to_string()]
}

impl SearchRule {
    /// Builds the search URL for a keyword
    pub fn search_url(&self, keyword: &str) -> String {
        if self.url.contains("{keyword}") {
            let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
            self.url.replace("{keyword}", &encoded)
        } else {
            self.url.clone()
        }
    }

    /// Builds the url-encoded form body for a keyword
    ///
    /// The template is a `key=value&...` list; `{keyword}` inside any value
    /// is replaced before encoding.
    pub fn form_body(&self, keyword: &str) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for pair in self.body.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            serializer.append_pair(key, &value.replace("{keyword}", keyword));
        }
        serializer.finish()
    }

    /// Renders the static cookies as a single `Cookie` header value
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
