//! EPUB 3 merger
//!
//! The package is written directly with the `zip` crate:
//! - `mimetype` first and uncompressed
//! - `META-INF/container.xml` pointing at `OEBPS/content.opf`
//! - package document, EPUB 3 navigation document and a legacy NCX
//! - one XHTML document per chapter, plus an optional cover image

use crate::config::ExportFormat;
use crate::model::Book;
use crate::output::files::ChapterFile;
use crate::output::html::language_of;
use crate::output::traits::{BookMerger, CoverImage, OutputResult};
use html_escape::{encode_double_quoted_attribute, encode_text};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const STYLESHEET: &str = "body { margin: 0 5%; line-height: 1.6; }\nh2 { text-align: center; }\np { text-indent: 2em; margin: 0.4em 0; }\n";

/// Packages XHTML chapter sections into an EPUB
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubMerger;

impl BookMerger for EpubMerger {
    fn format(&self) -> ExportFormat {
        ExportFormat::Epub
    }

    fn merge(
        &self,
        book: &Book,
        chapters: &[ChapterFile],
        cover: Option<&CoverImage>,
        target: &Path,
    ) -> OutputResult<()> {
        let file = BufWriter::new(File::create(target)?);
        let mut zip = ZipWriter::new(file);
        write_package(&mut zip, book, chapters, cover)?;
        zip.finish()?.flush()?;
        Ok(())
    }
}

fn write_package<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    book: &Book,
    chapters: &[ChapterFile],
    cover: Option<&CoverImage>,
) -> OutputResult<()> {
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let lang = language_of(book);

    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    zip.start_file("OEBPS/style.css", deflated)?;
    zip.write_all(STYLESHEET.as_bytes())?;

    if let Some(cover) = cover {
        zip.start_file(format!("OEBPS/images/cover.{}", cover.extension), stored)?;
        zip.write_all(&cover.bytes)?;
        zip.start_file("OEBPS/cover.xhtml", deflated)?;
        zip.write_all(
            xhtml_document(
                &book.book_name,
                lang,
                "style.css",
                &format!(
                    "<div class=\"cover\"><img src=\"images/cover.{}\" alt=\"{}\"/></div>",
                    cover.extension,
                    encode_double_quoted_attribute(&book.book_name)
                ),
            )
            .as_bytes(),
        )?;
    }

    for chapter in chapters {
        let section = chapter.read()?;
        zip.start_file(format!("OEBPS/{}", chapter_href(chapter)), deflated)?;
        zip.write_all(xhtml_document(&chapter.title, lang, "../style.css", section.trim_end()).as_bytes())?;
    }

    zip.start_file("OEBPS/nav.xhtml", deflated)?;
    zip.write_all(nav_document(book, chapters, lang).as_bytes())?;

    zip.start_file("OEBPS/toc.ncx", deflated)?;
    zip.write_all(ncx_document(book, chapters).as_bytes())?;

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(package_document(book, chapters, cover, lang).as_bytes())?;

    Ok(())
}

/// Stable identifier derived from the book name and author
pub fn book_identifier(book: &Book) -> String {
    let mut hasher = Sha256::new();
    hasher.update(book.book_name.as_bytes());
    hasher.update(b"\n");
    hasher.update(book.author.as_bytes());
    format!("urn:sha256:{}", hex::encode(hasher.finalize()))
}

fn chapter_href(chapter: &ChapterFile) -> String {
    format!("text/chapter_{:04}.xhtml", chapter.chapter_no)
}

fn chapter_id(chapter: &ChapterFile) -> String {
    format!("chapter-{}", chapter.chapter_no)
}

fn xhtml_document(title: &str, lang: &str, stylesheet: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" xml:lang=\"{lang}\" lang=\"{lang}\">\n\
         <head>\n<meta charset=\"utf-8\"/>\n<title>{title}</title>\n\
         <link rel=\"stylesheet\" type=\"text/css\" href=\"{css}\"/>\n</head>\n\
         <body>\n{body}\n</body>\n</html>\n",
        lang = lang,
        title = encode_text(title),
        css = stylesheet,
        body = body,
    )
}

fn nav_document(book: &Book, chapters: &[ChapterFile], lang: &str) -> String {
    let mut items = String::new();
    for chapter in chapters {
        items.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter_href(chapter),
            encode_text(&chapter.title)
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" xml:lang=\"{lang}\" lang=\"{lang}\">\n\
         <head>\n<meta charset=\"utf-8\"/>\n<title>{title}</title>\n</head>\n\
         <body>\n  <nav epub:type=\"toc\" id=\"toc\">\n    <h1>{title}</h1>\n    <ol>\n{items}    </ol>\n  </nav>\n</body>\n</html>\n",
        lang = lang,
        title = encode_text(&book.book_name),
        items = items,
    )
}

fn ncx_document(book: &Book, chapters: &[ChapterFile]) -> String {
    let mut points = String::new();
    for (index, chapter) in chapters.iter().enumerate() {
        points.push_str(&format!(
            "    <navPoint id=\"nav-{no}\" playOrder=\"{order}\">\n      <navLabel><text>{title}</text></navLabel>\n      <content src=\"{href}\"/>\n    </navPoint>\n",
            no = chapter.chapter_no,
            order = index + 1,
            title = encode_text(&chapter.title),
            href = chapter_href(chapter),
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n\
         <head>\n  <meta name=\"dtb:uid\" content=\"{uid}\"/>\n</head>\n\
         <docTitle><text>{title}</text></docTitle>\n\
         <navMap>\n{points}</navMap>\n</ncx>\n",
        uid = book_identifier(book),
        title = encode_text(&book.book_name),
        points = points,
    )
}

fn package_document(
    book: &Book,
    chapters: &[ChapterFile],
    cover: Option<&CoverImage>,
    lang: &str,
) -> String {
    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    let mut metadata = format!(
        "    <dc:identifier id=\"book-id\">{}</dc:identifier>\n\
         \x20   <dc:title>{}</dc:title>\n\
         \x20   <dc:language>{}</dc:language>\n\
         \x20   <meta property=\"dcterms:modified\">{}</meta>\n",
        book_identifier(book),
        encode_text(&book.book_name),
        lang,
        modified
    );
    if !book.author.is_empty() {
        metadata.push_str(&format!(
            "    <dc:creator>{}</dc:creator>\n",
            encode_text(&book.author)
        ));
    }
    if !book.intro.is_empty() {
        metadata.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            encode_text(&book.intro)
        ));
    }

    let mut manifest = String::from(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n\
         \x20   <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n\
         \x20   <item id=\"css\" href=\"style.css\" media-type=\"text/css\"/>\n",
    );
    let mut spine = String::new();

    if let Some(cover) = cover {
        metadata.push_str("    <meta name=\"cover\" content=\"cover-image\"/>\n");
        manifest.push_str(&format!(
            "    <item id=\"cover-image\" href=\"images/cover.{}\" media-type=\"{}\" properties=\"cover-image\"/>\n",
            cover.extension, cover.media_type
        ));
        manifest.push_str(
            "    <item id=\"cover\" href=\"cover.xhtml\" media-type=\"application/xhtml+xml\"/>\n",
        );
        spine.push_str("    <itemref idref=\"cover\" linear=\"no\"/>\n");
    }

    for chapter in chapters {
        manifest.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            chapter_id(chapter),
            chapter_href(chapter)
        ));
        spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", chapter_id(chapter)));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"book-id\" xml:lang=\"{lang}\">\n\
         \x20 <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n{metadata}  </metadata>\n\
         \x20 <manifest>\n{manifest}  </manifest>\n\
         \x20 <spine toc=\"ncx\">\n{spine}  </spine>\n\
         </package>\n",
        lang = lang,
        metadata = metadata,
        manifest = manifest,
        spine = spine,
    )
}
