//! Single-document HTML merger

use crate::config::ExportFormat;
use crate::model::Book;
use crate::output::files::ChapterFile;
use crate::output::traits::{BookMerger, CoverImage, OutputResult};
use html_escape::encode_text;
use std::fs;
use std::path::Path;

/// Wraps every chapter section into one XHTML document with a table of contents
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlMerger;

impl BookMerger for HtmlMerger {
    fn format(&self) -> ExportFormat {
        ExportFormat::Html
    }

    fn merge(
        &self,
        book: &Book,
        chapters: &[ChapterFile],
        _cover: Option<&CoverImage>,
        target: &Path,
    ) -> OutputResult<()> {
        let title = encode_text(&book.book_name);
        let mut doc = String::new();

        doc.push_str("<!DOCTYPE html>\n");
        doc.push_str(&format!(
            "<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{}\">\n",
            language_of(book)
        ));
        doc.push_str("<head>\n<meta charset=\"utf-8\"/>\n");
        doc.push_str(&format!("<title>{}</title>\n", title));
        doc.push_str("</head>\n<body>\n");

        doc.push_str(&format!("<header>\n<h1>{}</h1>\n", title));
        if !book.author.is_empty() {
            doc.push_str(&format!(
                "<p class=\"author\">{}</p>\n",
                encode_text(&book.author)
            ));
        }
        if !book.intro.is_empty() {
            doc.push_str(&format!(
                "<p class=\"intro\">{}</p>\n",
                encode_text(&book.intro)
            ));
        }
        doc.push_str("</header>\n");

        doc.push_str("<nav>\n<ol>\n");
        for chapter in chapters {
            doc.push_str(&format!(
                "<li><a href=\"#chapter-{}\">{}</a></li>\n",
                chapter.chapter_no,
                encode_text(&chapter.title)
            ));
        }
        doc.push_str("</ol>\n</nav>\n");

        for chapter in chapters {
            doc.push_str(&format!("<section id=\"chapter-{}\">\n", chapter.chapter_no));
            doc.push_str(chapter.read()?.trim_end());
            doc.push_str("\n</section>\n");
        }

        doc.push_str("</body>\n</html>\n");
        fs::write(target, doc)?;
        Ok(())
    }
}

/// `zh` when the title carries CJK characters, `en` otherwise
pub fn language_of(book: &Book) -> &'static str {
    let is_cjk = |c: char| matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}' | '\u{3000}'..='\u{303f}');
    if book.book_name.chars().any(is_cjk) {
        "zh"
    } else {
        "en"
    }
}
