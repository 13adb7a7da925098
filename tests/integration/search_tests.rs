//! Search against stub sites

use crate::common::{stub_context, stub_crawler, stub_settings, POST_SOURCE};
use shiori::config::ExportFormat;
use shiori::Crawler;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn results_page(rows: &[(&str, &str, &str)], pages: &[&str]) -> String {
    let rows: String = rows
        .iter()
        .map(|(name, author, href)| {
            format!(
                r#"<li><a class="name" href="{}">{}</a><span class="author">{}</span><span class="latest">Chapter 9</span></li>"#,
                href, name, author
            )
        })
        .collect();
    let pages: String = pages
        .iter()
        .map(|href| format!(r#"<a href="{}">page</a>"#, href))
        .collect();
    format!(
        r#"<html><body><ul class="results">{}</ul><div class="pages">{}</div></body></html>"#,
        rows, pages
    )
}

#[tokio::test]
async fn test_search_follows_pagination_in_order() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "foo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(
            &[("Foo", "Bar", "/book/1/"), ("Foo Two", "Baz", "/book/2/")],
            &["/search?q=foo", "/search/2?q=foo", "/search/3?q=foo"],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_page(&[("Foo Three", "Qux", "/book/3/")], &[]))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_page(&[("Foo Four", "Quux", "/book/4/")], &[])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    let results = crawler.search("foo").await.unwrap();

    let names: Vec<_> = results.iter().map(|r| r.book_name.as_str()).collect();
    assert_eq!(names, vec!["Foo", "Foo Two", "Foo Three", "Foo Four"]);
    assert_eq!(results[0].url, format!("{}/book/1/", server.uri()));
    assert_eq!(results[0].author, "Bar");
    assert_eq!(results[0].latest_chapter, "Chapter 9");
}

#[tokio::test]
async fn test_search_without_results() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(
            &[],
            &["/search/2?q=none"],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    assert!(crawler.search("none").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_search_sends_form_and_cookies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/modules/search.php"))
        .and(header("cookie", "lang=en"))
        .and(body_string_contains("searchkey=foo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_page(&[("Foo", "Bar", "/book/1/")], &[])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let settings = stub_settings(POST_SOURCE, dir.path(), ExportFormat::Txt);
    let crawler = Crawler::new(settings, stub_context(&server)).unwrap();
    let results = crawler.search("foo").await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].book_name, "Foo");
}

#[tokio::test]
async fn test_failing_result_page_fails_search() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(
            &[("Foo", "Bar", "/book/1/")],
            &["/search/2?q=foo"],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let crawler = stub_crawler(&server, dir.path(), ExportFormat::Txt);
    assert!(crawler.search("foo").await.is_err());
}
