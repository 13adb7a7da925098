//! End-to-end crawls against a stub novel site

use crate::common::{book_page, chapter_page, png_bytes, stub_crawler, stub_result};
use shiori::config::ExportFormat;
use shiori::parse::ChapterRange;
use shiori::ShioriError;
use std::fs;
use std::io::Read;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const THREE_CHAPTERS: &[(usize, &str)] = &[(1, "Chapter 1"), (2, "Chapter 2"), (3, "Chapter 3")];

async fn mount_book(server: &MockServer, chapters: &[(usize, &str)]) {
    Mock::given(method("GET"))
        .and(path("/book/1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(book_page(chapters)))
        .mount(server)
        .await;
}

async fn mount_chapter(server: &MockServer, no: usize, text: &str, delay_ms: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/book/1/{}.html", no)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(chapter_page(text))
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_merges_in_ordinal_order() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, THREE_CHAPTERS).await;
    // First chapter finishes last
    mount_chapter(&server, 1, "Text one", 300).await;
    mount_chapter(&server, 2, "Text two", 100).await;
    mount_chapter(&server, 3, "Text three", 0).await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    let result = crawler
        .crawl(&stub_result(&server), 0, 0)
        .await
        .unwrap()
        .expect("non-empty catalog");

    assert_eq!(result.chapter_count, 3);
    assert!(result.is_complete());
    assert_eq!(result.output_path, dir.path().join("Foo (Bar).txt"));

    let text = fs::read_to_string(&result.output_path).unwrap();
    let one = text.find("Text one").unwrap();
    let two = text.find("Text two").unwrap();
    let three = text.find("Text three").unwrap();
    assert!(one < two && two < three);
    assert!(text.contains("A quiet story."));
    assert!(!text.contains("BUY NOW"));
}

#[tokio::test]
async fn test_book_directory_and_chapter_files() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, THREE_CHAPTERS).await;
    for no in 1..=3 {
        mount_chapter(&server, no, "body", 0).await;
    }

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    crawler.crawl(&stub_result(&server), 0, 0).await.unwrap();

    let book_dir = dir.path().join("Foo (Bar)");
    assert!(book_dir.is_dir());
    assert!(book_dir.join("0001_Chapter 1.txt").is_file());
    assert!(book_dir.join("0003_Chapter 3.txt").is_file());
}

#[tokio::test]
async fn test_progress_counts_chapters_and_merge() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, THREE_CHAPTERS).await;
    for no in 1..=3 {
        mount_chapter(&server, no, "body", 0).await;
    }

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    let selected = stub_result(&server);
    crawler.crawl(&selected, 0, 0).await.unwrap();

    let snapshot = crawler.get_progress(&selected.url).unwrap();
    assert_eq!(snapshot.total, 4);
    assert_eq!(snapshot.completed, 4);
    assert!(snapshot.is_complete());
}

#[tokio::test]
async fn test_empty_catalog_returns_none() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, &[]).await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    let selected = stub_result(&server);
    let result = crawler.crawl(&selected, 0, 0).await.unwrap();

    assert!(result.is_none());
    assert!(crawler.get_progress(&selected.url).is_none());
    assert!(!dir.path().join("Foo (Bar).txt").exists());
}

#[tokio::test]
async fn test_exhausted_chapter_is_reported_not_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, THREE_CHAPTERS).await;
    mount_chapter(&server, 1, "Text one", 0).await;
    mount_chapter(&server, 3, "Text three", 0).await;
    Mock::given(method("GET"))
        .and(path("/book/1/2.html"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    let selected = stub_result(&server);
    let result = crawler.crawl(&selected, 0, 0).await.unwrap().unwrap();

    assert_eq!(result.failed_chapters, vec![2]);
    assert_eq!(result.chapter_count, 3);
    let text = fs::read_to_string(&result.output_path).unwrap();
    assert!(text.contains("Text one"));
    assert!(text.contains("Text three"));

    let snapshot = crawler.get_progress(&selected.url).unwrap();
    assert_eq!(snapshot.completed, snapshot.total);
}

#[tokio::test]
async fn test_failed_chapter_keeps_its_section() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, THREE_CHAPTERS).await;
    mount_chapter(&server, 1, "Text one", 0).await;
    mount_chapter(&server, 3, "Text three", 0).await;
    Mock::given(method("GET"))
        .and(path("/book/1/2.html"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Html);
    let result = crawler.crawl(&stub_result(&server), 0, 0).await.unwrap().unwrap();

    assert_eq!(result.failed_chapters, vec![2]);
    let text = fs::read_to_string(&result.output_path).unwrap();
    assert_eq!(text.matches("<section id=\"chapter-").count(), 3);
    let two = text.find("<section id=\"chapter-2\">").unwrap();
    assert!(text[two..].contains("<h2>Chapter 2</h2>"));
    assert!(text.find("Text one").unwrap() < two);
    assert!(two < text.find("Text three").unwrap());
}

#[tokio::test]
async fn test_single_failed_chapter_still_merges() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, &[(1, "Chapter 1")]).await;
    Mock::given(method("GET"))
        .and(path("/book/1/1.html"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    let result = crawler
        .crawl(&stub_result(&server), 0, 0)
        .await
        .unwrap()
        .expect("non-empty catalog");

    assert_eq!(result.chapter_count, 1);
    assert_eq!(result.failed_chapters, vec![1]);
    assert!(!result.is_complete());
    let text = fs::read_to_string(&result.output_path).unwrap();
    assert!(text.contains("Chapter 1"));
}

#[tokio::test]
async fn test_chapter_range_keeps_ordinals() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, THREE_CHAPTERS).await;
    mount_chapter(&server, 2, "Text two", 0).await;
    mount_chapter(&server, 3, "Text three", 0).await;
    Mock::given(method("GET"))
        .and(path("/book/1/1.html"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    let result = crawler.crawl(&stub_result(&server), 2, 0).await.unwrap().unwrap();

    assert_eq!(result.chapter_count, 2);
    assert!(dir.path().join("Foo (Bar)").join("0002_Chapter 2.txt").is_file());
}

#[tokio::test]
async fn test_epub_output_with_cover() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, THREE_CHAPTERS).await;
    for (no, text) in [(1, "Text one"), (2, "Text two"), (3, "Text three")] {
        mount_chapter(&server, no, text, 0).await;
    }
    Mock::given(method("GET"))
        .and(path("/cover.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Epub);
    let result = crawler.crawl(&stub_result(&server), 0, 0).await.unwrap().unwrap();

    assert_eq!(result.output_path, dir.path().join("Foo (Bar).epub"));
    assert!(!dir.path().join("Foo (Bar)").exists());

    let file = fs::File::open(&result.output_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");
    assert!(archive.by_name("OEBPS/images/cover.png").is_ok());

    let mut chapter = String::new();
    archive
        .by_name("OEBPS/text/chapter_0002.xhtml")
        .unwrap()
        .read_to_string(&mut chapter)
        .unwrap();
    assert!(chapter.contains("<p>Text two</p>"));
}

#[tokio::test]
async fn test_cancelled_crawl_skips_chapters_and_merge() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_book(&server, THREE_CHAPTERS).await;
    Mock::given(method("GET"))
        .and(path("/book/1/1.html"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    let selected = stub_result(&server);
    let task = crawler.spawn_crawl(selected.clone(), ChapterRange::all());
    task.cancel();

    let result = task.join().await;
    assert!(matches!(result, Err(ShioriError::Cancelled)));
    assert!(!dir.path().join("Foo (Bar).txt").exists());

    let snapshot = crawler.get_progress(&selected.url).unwrap();
    assert_eq!(snapshot.completed, 3);
    assert_eq!(snapshot.total, 4);
}
