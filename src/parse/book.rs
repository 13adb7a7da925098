//! Book metadata parser

use crate::fetch::Fetcher;
use crate::model::Book;
use crate::parse::common::{clean_blank, resolve_link, FieldSelector};
use crate::rules::Rule;
use crate::Result;
use scraper::Html;
use url::Url;

/// Fetches the book page and reads its metadata
pub async fn fetch_book(fetcher: &Fetcher, rule: &Rule, book_url: &str) -> Result<Book> {
    let page = fetcher.session().get_text(book_url).await?.into_result()?;
    let book = parse_book(&page.body, rule)?;
    tracing::debug!("Book page {} -> '{}' by '{}'", book_url, book.book_name, book.author);
    Ok(book)
}

/// Reads the four metadata fields of a book page
///
/// A field whose selector matches nothing is left empty. The cover URL is
/// made absolute against the rule's base URL.
pub fn parse_book(html: &str, rule: &Rule) -> Result<Book> {
    let base_url = Url::parse(&rule.url)?;
    let document = Html::parse_document(html);

    let read = |field: &str| -> Result<String> {
        Ok(FieldSelector::parse(field)?
            .and_then(|f| f.extract_from(&document))
            .unwrap_or_default())
    };

    let cover_url = read(&rule.book.cover_url)?;
    Ok(Book {
        book_name: read(&rule.book.book_name)?,
        author: read(&rule.book.author)?,
        intro: clean_blank(&read(&rule.book.intro)?),
        cover_url: resolve_link(&cover_url, &base_url).unwrap_or_default(),
    })
}
