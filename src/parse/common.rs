//! Selector and link helpers shared by every parser

use crate::{RuleError, RuleResult};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A compiled rule field: a CSS selector plus an optional attribute name
///
/// `div.info > a` reads the trimmed text of the first match, while
/// `img.cover@src` reads the `src` attribute.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    selector: Selector,
    attr: Option<String>,
}

impl FieldSelector {
    /// Compiles a field; an empty rule field yields `None`
    pub fn parse(field: &str) -> RuleResult<Option<Self>> {
        let field = field.trim();
        if field.is_empty() {
            return Ok(None);
        }

        let (css, attr) = split_attr(field);
        Ok(Some(Self {
            selector: compile_selector(css)?,
            attr: attr.map(str::to_string),
        }))
    }

    /// Value of the first match below `scope`
    pub fn extract(&self, scope: ElementRef<'_>) -> Option<String> {
        scope.select(&self.selector).find_map(|element| self.read(element))
    }

    /// Value of the first match in the whole document
    pub fn extract_from(&self, document: &Html) -> Option<String> {
        document.select(&self.selector).find_map(|element| self.read(element))
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Value read from one already-selected element
    pub fn read(&self, element: ElementRef<'_>) -> Option<String> {
        let value = match &self.attr {
            Some(attr) => element.value().attr(attr)?.trim().to_string(),
            None => element_text(element),
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Splits `css@attr` on the last `@` when the tail is a plain attribute name
fn split_attr(field: &str) -> (&str, Option<&str>) {
    if let Some((css, attr)) = field.rsplit_once('@') {
        let is_attr_name = !attr.is_empty()
            && attr
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'));
        if is_attr_name && !css.trim().is_empty() {
            return (css.trim(), Some(attr));
        }
    }
    (field, None)
}

/// Compiles a CSS selector from a rule
pub fn compile_selector(css: &str) -> RuleResult<Selector> {
    Selector::parse(css).map_err(|_| RuleError::Selector(css.to_string()))
}

/// Compiles an optional selector; empty rule fields yield `None`
pub fn compile_optional(css: &str) -> RuleResult<Option<Selector>> {
    let css = css.trim();
    if css.is_empty() {
        Ok(None)
    } else {
        compile_selector(css).map(Some)
    }
}

/// Collapsed, trimmed text content of an element
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_blank(&element.text().collect::<String>())
}

/// Collapses runs of whitespace (including `&nbsp;` and the ideographic
/// space) into single spaces and trims the ends
pub fn clean_blank(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}' || c == '\u{3000}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First capture group of `pattern` in `text`
///
/// # Returns
///
/// * `Ok(Some(group))` - The pattern matched and the group participated
/// * `Ok(None)` - No match
/// * `Err(RuleError::Pattern)` - The pattern does not compile
pub fn capture_group1(pattern: &str, text: &str) -> RuleResult<Option<String>> {
    let regex = Regex::new(pattern).map_err(|source| RuleError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only anchors
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

/// Absolute targets of every `href` matched by `selector`, in document order
pub fn collect_links(document: &Html, selector: &Selector, base_url: &Url) -> Vec<String> {
    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}
