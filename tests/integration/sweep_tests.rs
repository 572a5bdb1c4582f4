//! Integration tests for the sweeper
//!
//! These tests use wiremock to serve listing pages and drive the full sweep
//! through the real reqwest client pool.

use catalog_sweep::config::Config;
use catalog_sweep::crawler::{run_sweep, ClientManager, NoDelay, RusnebExtractor, Scheduler, SchedulerOptions};
use catalog_sweep::output::{load_item_list, write_item_list};
use catalog_sweep::url::{ParseRequest, UrlBuilder};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOG_ID: &str = "000200_000018_RU_NLR_DRGNLR_3107";

/// Creates a fast test configuration pointed at the mock server
fn create_test_config(server: &MockServer, workers: usize) -> Config {
    let mut config = Config::default();
    config.scheduler.num_workers = workers;
    config.scheduler.chunk_size = 2;
    config.scheduler.max_retries = 3;
    config.scheduler.idle_backoff_ms = 10;
    config.scheduler.request_delay_min_ms = 0;
    config.scheduler.request_delay_max_ms = 0;
    config.client.base_url = format!("{}/", server.uri());
    config.client.timeout_secs = 5;
    config
}

fn catalog_page(ids: &[&str]) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="cards-results__item">
                    <a class="cards-results__link" href="/catalog/{}">Read</a>
                </div>"#,
                id
            )
        })
        .collect();
    format!("<html><body><div class=\"cards-results\">{}</div></body></html>", cards)
}

fn search_page(ids: &[&str]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="search-list__item">
                    <a class="search-list__item_link" href="/catalog/{}/">Title</a>
                </div>"#,
                id
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", items)
}

async fn mount_catalog_page(server: &MockServer, page: u64, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/catalog/{}/", CATALOG_ID)))
        .and(query_param("volumes", format!("page-{}", page)))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(ids)))
        .mount(server)
        .await;
}

/// Every catalog page not mounted before this one is empty
async fn mount_catalog_end(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/catalog/{}/", CATALOG_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(&[])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_catalog_sweep_end_to_end() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, 1, &["vol_1", "vol_2"]).await;
    mount_catalog_page(&server, 2, &["vol_2", "vol_3"]).await;
    mount_catalog_page(&server, 3, &["vol_4"]).await;
    mount_catalog_end(&server).await;

    let config = create_test_config(&server, 2);
    let outcome = run_sweep(&config, ParseRequest::catalog(CATALOG_ID), HashSet::new())
        .await
        .unwrap();

    let report = &outcome.report;
    assert!(!report.has_error);
    assert!(report.catalog_exhausted);
    assert_eq!(report.max_page_found, 3);
    assert!(report.failed_pages.is_empty());

    let mut items = outcome.items.clone();
    items.sort();
    assert_eq!(items, vec!["vol_1", "vol_2", "vol_3", "vol_4"]);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/catalog/{}/", CATALOG_ID)))
        .and(query_param("volumes", "page-1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_catalog_page(&server, 1, &["vol_1"]).await;
    mount_catalog_end(&server).await;

    let config = create_test_config(&server, 1);
    let outcome = run_sweep(&config, ParseRequest::catalog(CATALOG_ID), HashSet::new())
        .await
        .unwrap();

    assert!(!outcome.report.has_error);
    assert!(outcome.report.failed_pages.is_empty());
    assert_eq!(outcome.items, vec!["vol_1"]);
}

#[tokio::test]
async fn test_missing_page_is_abandoned() {
    let server = MockServer::start().await;

    mount_catalog_page(&server, 1, &["vol_1"]).await;
    Mock::given(method("GET"))
        .and(path(format!("/catalog/{}/", CATALOG_ID)))
        .and(query_param("volumes", "page-2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;
    mount_catalog_page(&server, 3, &["vol_3"]).await;
    mount_catalog_end(&server).await;

    let mut config = create_test_config(&server, 1);
    config.scheduler.max_retries = 2;

    let outcome = run_sweep(&config, ParseRequest::catalog(CATALOG_ID), HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.report.failed_pages, vec![2]);
    assert!(!outcome.report.has_error);
    assert_eq!(outcome.items, vec!["vol_1", "vol_3"]);
}

#[tokio::test]
async fn test_search_sweep() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("q", "Петроградская газета"))
        .and(query_param("PAGEN_1", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page(&["000199_1", "000199_2"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page(&[])))
        .mount(&server)
        .await;

    let config = create_test_config(&server, 1);
    let clients = ClientManager::from_config(&config.client, 1).unwrap();
    let scheduler = Scheduler::new(
        ParseRequest::search("Петроградская газета"),
        UrlBuilder::new(&config.client.base_url).unwrap(),
        Arc::new(clients),
        Arc::new(RusnebExtractor),
        SchedulerOptions {
            idle_backoff: Duration::from_millis(10),
            ..SchedulerOptions::from(&config.scheduler)
        },
    )
    .with_delay(Arc::new(NoDelay));
    let frontier = scheduler.frontier();

    let report = scheduler.run().await;

    assert!(!report.has_error);
    assert_eq!(frontier.items(), vec!["000199_1", "000199_2"]);
}

#[tokio::test]
async fn test_skip_file_round_trip() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, 1, &["vol_1", "vol_2"]).await;
    mount_catalog_page(&server, 2, &["vol_3"]).await;
    mount_catalog_end(&server).await;

    let dir = TempDir::new().unwrap();
    let skip_path = dir.path().join("done.txt");
    std::fs::write(&skip_path, "vol_2\n").unwrap();

    let mut config = create_test_config(&server, 1);
    config.output.items_path = dir.path().join("out").join("items.txt");

    let downloaded = load_item_list(&skip_path).unwrap();
    let outcome = run_sweep(&config, ParseRequest::catalog(CATALOG_ID), downloaded)
        .await
        .unwrap();
    write_item_list(&config.output.items_path, &outcome.items).unwrap();

    let written = std::fs::read_to_string(&config.output.items_path).unwrap();
    assert_eq!(written, "vol_1\nvol_3\n");
}

#[tokio::test]
async fn test_page_limit_stops_sweep() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/catalog/{}/", CATALOG_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(&["same_volume"])))
        .expect(4)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, 2);
    config.scheduler.max_pages = Some(4);

    let outcome = run_sweep(&config, ParseRequest::catalog(CATALOG_ID), HashSet::new())
        .await
        .unwrap();

    assert!(!outcome.report.has_error);
    assert_eq!(outcome.report.pages_processed, 4);
    assert_eq!(outcome.items, vec!["same_volume"]);
}

const FILES_PATH: &str = "/local/tools/exalead/getFiles.php";

fn pdf_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/pdf")
        .set_body_bytes(body.as_bytes().to_vec())
}

#[tokio::test]
async fn test_sweep_downloads_discovered_items() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, 1, &["vol_1", "vol_2"]).await;
    mount_catalog_page(&server, 2, &["vol_3"]).await;
    mount_catalog_end(&server).await;

    Mock::given(method("GET"))
        .and(path(FILES_PATH))
        .and(query_param("book_id", "vol_1"))
        .and(query_param("doc_type", "pdf"))
        .respond_with(
            pdf_response("%PDF-1.4 first")
                .insert_header("content-disposition", r#"attachment; filename="Volume 1.pdf""#),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FILES_PATH))
        .and(query_param("doc_type", "pdf"))
        .respond_with(pdf_response("%PDF-1.4"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, 2);
    config.download.workers = 2;
    config.download.directory = dir.path().join("downloads");
    config.download.request_delay_min_ms = 0;
    config.download.request_delay_max_ms = 0;

    let outcome = run_sweep(&config, ParseRequest::catalog(CATALOG_ID), HashSet::new())
        .await
        .unwrap();

    assert!(!outcome.report.has_error);
    assert_eq!(outcome.report.items_downloaded, 3);
    assert!(outcome.pending_downloads.is_empty());

    let downloads = dir.path().join("downloads");
    assert_eq!(
        std::fs::read(downloads.join("Volume 1.pdf")).unwrap(),
        b"%PDF-1.4 first".to_vec()
    );
    assert!(downloads.join("vol_2.pdf").exists());
    assert!(downloads.join("vol_3.pdf").exists());
}

#[tokio::test]
async fn test_non_pdf_download_is_abandoned() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, 1, &["good", "blocked"]).await;
    mount_catalog_end(&server).await;

    Mock::given(method("GET"))
        .and(path(FILES_PATH))
        .and(query_param("book_id", "blocked"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<html>captcha</html>"),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FILES_PATH))
        .respond_with(pdf_response("%PDF-1.4"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, 1);
    config.download.workers = 1;
    config.download.max_retries = 2;
    config.download.directory = dir.path().to_path_buf();
    config.download.request_delay_min_ms = 0;
    config.download.request_delay_max_ms = 0;

    let outcome = run_sweep(&config, ParseRequest::catalog(CATALOG_ID), HashSet::new())
        .await
        .unwrap();

    let report = &outcome.report;
    assert!(!report.has_error);
    assert_eq!(report.items_downloaded, 1);
    assert_eq!(report.failed_downloads, vec!["blocked"]);
    assert!(dir.path().join("good.pdf").exists());
    assert!(!dir.path().join("blocked.pdf").exists());
}

#[tokio::test]
async fn test_skipped_items_are_not_downloaded() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, 1, &["old", "new"]).await;
    mount_catalog_end(&server).await;

    Mock::given(method("GET"))
        .and(path(FILES_PATH))
        .and(query_param("book_id", "old"))
        .respond_with(pdf_response("%PDF-1.4"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FILES_PATH))
        .respond_with(pdf_response("%PDF-1.4"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, 1);
    config.download.workers = 1;
    config.download.directory = dir.path().to_path_buf();
    config.download.request_delay_min_ms = 0;
    config.download.request_delay_max_ms = 0;

    let skip = HashSet::from(["old".to_string()]);
    let outcome = run_sweep(&config, ParseRequest::catalog(CATALOG_ID), skip)
        .await
        .unwrap();

    assert_eq!(outcome.items, vec!["new"]);
    assert_eq!(outcome.report.items_downloaded, 1);
    assert!(dir.path().join("new.pdf").exists());
}
