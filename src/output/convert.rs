//! Chapter content conversion
//!
//! Turns the raw HTML fragment collected from a chapter's pages into clean
//! paragraphs and renders them for the configured export format:
//! - `txt`: the title, a blank line, then paragraphs separated by blank lines
//! - `epub`/`html`: an XHTML section with an `<h2>` title and one `<p>` per paragraph

use crate::config::ExportFormat;
use crate::parse::common::{clean_blank, compile_selector};
use crate::rules::ChapterRule;
use crate::{RuleError, RuleResult};
use html_escape::encode_text;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Elements that end the current line of text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article", "blockquote",
    "tr",
];

/// Boilerplate removal compiled from a chapter rule
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    tags: Vec<Selector>,
    texts: Vec<Regex>,
}

impl ContentFilter {
    pub fn from_rule(rule: &ChapterRule) -> RuleResult<Self> {
        let tags = rule
            .filter_tag
            .iter()
            .map(|css| compile_selector(css))
            .collect::<RuleResult<Vec<_>>>()?;
        let texts = rule
            .filter_txt
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| RuleError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<RuleResult<Vec<_>>>()?;
        Ok(Self { tags, texts })
    }

    fn skips(&self, element: &ElementRef<'_>) -> bool {
        self.tags.iter().any(|selector| selector.matches(element))
    }

    fn scrub(&self, line: &str) -> String {
        let mut line = line.to_string();
        for pattern in &self.texts {
            line = pattern.replace_all(&line, "").into_owned();
        }
        clean_blank(&line)
    }
}

/// Renders chapter HTML into one export format
#[derive(Debug, Clone)]
pub struct Converter {
    format: ExportFormat,
    filter: ContentFilter,
}

impl Converter {
    pub fn new(format: ExportFormat, filter: ContentFilter) -> Self {
        Self { format, filter }
    }

    /// Builds a converter from the chapter section of a source rule
    pub fn from_rule(format: ExportFormat, rule: &ChapterRule) -> RuleResult<Self> {
        Ok(Self::new(format, ContentFilter::from_rule(rule)?))
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Converts a chapter's raw HTML into the export representation
    pub fn convert(&self, title: &str, html: &str) -> String {
        let paragraphs = extract_paragraphs(html, &self.filter);
        if self.format.is_markup() {
            render_section(title, &paragraphs)
        } else {
            render_text(title, &paragraphs)
        }
    }
}

/// Splits an HTML fragment into cleaned, non-empty paragraphs
pub fn extract_paragraphs(html: &str, filter: &ContentFilter) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut lines = Vec::new();
    let mut current = String::new();

    collect_lines(fragment.root_element(), filter, &mut current, &mut lines);
    lines.push(current);

    lines
        .iter()
        .map(|line| filter.scrub(line))
        .filter(|line| !line.is_empty())
        .collect()
}

fn collect_lines(
    element: ElementRef<'_>,
    filter: &ContentFilter,
    current: &mut String,
    lines: &mut Vec<String>,
) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if filter.skips(&child) {
                    continue;
                }
                let name = child.value().name();
                if matches!(name, "script" | "style") {
                    continue;
                }

                let is_block = BLOCK_ELEMENTS.contains(&name);
                if is_block {
                    lines.push(std::mem::take(current));
                }
                collect_lines(child, filter, current, lines);
                if is_block {
                    lines.push(std::mem::take(current));
                }
            }
            _ => {}
        }
    }
}

/// Plain text rendering
pub fn render_text(title: &str, paragraphs: &[String]) -> String {
    let mut text = String::with_capacity(title.len() + paragraphs.iter().map(String::len).sum::<usize>() * 2);
    text.push_str(title);
    text.push_str("\n\n");
    text.push_str(&paragraphs.join("\n\n"));
    text.push('\n');
    text
}

/// XHTML section rendering used by the markup formats
pub fn render_section(title: &str, paragraphs: &[String]) -> String {
    let mut section = format!("<h2>{}</h2>\n", encode_text(title));
    for paragraph in paragraphs {
        section.push_str("<p>");
        section.push_str(&encode_text(paragraph));
        section.push_str("</p>\n");
    }
    section
}
