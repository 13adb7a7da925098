//! Source rule module
//!
//! A source rule describes, for one site, where the search results, book
//! metadata, chapter catalog and chapter content live in the site's HTML.
//! Rules are bundled read-only JSON documents, loaded lazily and cached per
//! [`RuleStore`].

mod store;
mod types;

pub use store::RuleStore;
pub use types::{BookRule, CatalogRule, ChapterRule, HttpMethod, Rule, SearchRule};
