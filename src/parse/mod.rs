//! Rule-driven page parsers
//!
//! Each parser fetches its page(s) through a [`Fetcher`](crate::fetch::Fetcher)
//! and then extracts typed records synchronously from the parsed document:
//! - [`search`]: search result rows, optionally across result pages
//! - [`book`]: book metadata
//! - [`catalog`]: the ordered chapter list
//! - [`chapter`]: chapter content, optionally across split pages

pub mod book;
pub mod catalog;
pub mod chapter;
pub mod common;
pub mod search;

pub use book::{fetch_book, parse_book};
pub use catalog::{catalog_url, fetch_catalog, parse_catalog, ChapterRange};
pub use chapter::{download_chapter, fetch_chapter_html, parse_chapter_page, ChapterPage, MAX_CHAPTER_PAGES};
pub use common::FieldSelector;
pub use search::{parse_search_page, search, SearchPage};
