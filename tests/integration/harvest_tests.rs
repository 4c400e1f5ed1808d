//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small catalog site and run the
//! stages end-to-end against it.

use sumi_harvest::config::{Config, SchedulerConfig};
use sumi_harvest::crawler::{Coordinator, Mode};
use sumi_harvest::storage::{CheckpointStore, FsCheckpointStore};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.site.base_url = base_url.to_string();
    config.scheduler = SchedulerConfig {
        requests_per_second: 100.0,
        max_retries: 1,
        base_retry_delay_ms: 10,
        request_timeout_secs: 5,
        ..SchedulerConfig::default()
    };
    config.delays.min_item_delay_ms = 0;
    config.delays.max_item_delay_ms = 0;
    config.output.data_dir = dir.path().join("data").to_string_lossy().into_owned();
    config.output.ledger_path = dir
        .path()
        .join("data/ledger.db")
        .to_string_lossy()
        .into_owned();
    config.output.log_dir = dir.path().join("logs").to_string_lossy().into_owned();
    config
}

fn catalog_html(rows: &[(&str, u32)]) -> String {
    let items: String = rows
        .iter()
        .map(|(slug, chapters)| {
            format!(
                r#"<li class="novel-item">
                    <a href="/novel/{slug}.html" title="{slug}">{slug}</a>
                    <div class="novel-stats"><span><i class="material-icons">book</i>{chapters} Chapters</span></div>
                    <div class="novel-stats"><span class="status">Ongoing</span></div>
                </li>"#
            )
        })
        .collect();
    format!(r#"<html><body><ul class="novel-list">{items}</ul></body></html>"#)
}

fn item_html(id: &str, title: &str) -> String {
    format!(
        r#"<html><body><article id="novel" data-novelid="{id}">
            <h1 class="novel-title">{title}</h1>
            <div class="author"><span>Author:</span><span>Jane Writer</span></div>
            <div class="header-stats"><span><strong>Ongoing</strong></span></div>
            <div class="categories"><ul><li><a href="/c/action">Action</a></li></ul></div>
            <div class="summary"><div class="content"><p>A story.</p></div></div>
        </article></body></html>"#
    )
}

fn chapter_html(index: u32) -> String {
    format!(
        r#"<html><body><h2>Chapter {index}: Onward</h2>
            <div class="chapter-content"><p>Body of chapter {index}.</p><script>ads()</script></div>
        </body></html>"#
    )
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_catalog(server: &MockServer, rows: &[(&str, u32)]) {
    mount_html(server, "/list/all/all-newstime-0.html", catalog_html(rows)).await;
}

async fn mount_chapters(server: &MockServer, slug: &str, range: std::ops::RangeInclusive<u32>) {
    for index in range {
        mount_html(
            server,
            &format!("/novel/{}_{}.html", slug, index),
            chapter_html(index),
        )
        .await;
    }
}

/// Paths requested from the server, in order
async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn test_full_harvest_fills_gap_on_rerun() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    mount_catalog(&server, &[("alpha", 10)]).await;
    mount_html(&server, "/novel/alpha.html", item_html("1001", "alpha rising")).await;
    mount_chapters(&server, "alpha", 1..=4).await;
    mount_chapters(&server, "alpha", 6..=10).await;
    mount_html(
        &server,
        "/novel/alpha_5.html",
        r#"<html><body><h2>Chapter 5</h2><div class="chapter-content"></div></body></html>"#
            .to_string(),
    )
    .await;

    let coordinator = Coordinator::new(config.clone(), "test".to_string()).unwrap();
    let summaries = coordinator.run(Mode::All).await.unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[2].subitems_fetched, 9);
    assert_eq!(summaries[2].subitems_failed, 1);

    let store = FsCheckpointStore::new(&config.output.data_dir).unwrap();
    let catalog = store.read_catalog().unwrap();
    let entry = catalog
        .get(&format!("{}/novel/alpha.html", server.uri()))
        .unwrap();
    assert_eq!(entry.id.as_deref(), Some("1001"));
    assert!(entry.updated);

    let detail = store.read_detail("1001").unwrap();
    assert_eq!(detail.title, "Alpha Rising");
    assert_eq!(detail.author, "Jane Writer");
    assert_eq!(detail.categories, vec!["Action"]);
    assert_eq!(detail.total_subitems, 10);
    assert_eq!(detail.completed_subitems, 4);
    assert_eq!(store.read_subitem_list("1001").unwrap().gaps(), vec![5]);

    let chapter = store.read_subitem("1001", 6).unwrap();
    assert_eq!(chapter.title, "Chapter 6: Onward");
    assert!(!chapter.body.contains("script"));

    // Chapter 5 comes back; nothing else is refetched
    server.reset().await;
    mount_catalog(&server, &[("alpha", 10)]).await;
    mount_html(&server, "/novel/alpha.html", item_html("1001", "alpha rising")).await;
    mount_chapters(&server, "alpha", 1..=10).await;

    coordinator.run(Mode::All).await.unwrap();
    assert_eq!(
        requested_paths(&server).await,
        vec![
            "/list/all/all-newstime-0.html".to_string(),
            "/novel/alpha_5.html".to_string(),
        ]
    );

    let detail = store.read_detail("1001").unwrap();
    assert_eq!(detail.completed_subitems, 10);
    assert!(store.read_subitem_list("1001").unwrap().gaps().is_empty());
}

#[tokio::test]
async fn test_grown_catalog_entry_is_patched_and_extended() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    mount_catalog(&server, &[("beta", 10)]).await;
    mount_html(&server, "/novel/beta.html", item_html("2002", "Beta")).await;
    mount_chapters(&server, "beta", 1..=10).await;

    let coordinator = Coordinator::new(config.clone(), "test".to_string()).unwrap();
    coordinator.run(Mode::All).await.unwrap();

    server.reset().await;
    mount_catalog(&server, &[("beta", 12)]).await;
    mount_html(&server, "/novel/beta.html", item_html("2002", "Beta")).await;
    mount_chapters(&server, "beta", 1..=12).await;

    let summaries = coordinator.run(Mode::All).await.unwrap();
    assert_eq!(summaries[0].changed, 1);
    assert_eq!(summaries[1].changed, 1);
    assert_eq!(summaries[2].subitems_fetched, 2);

    let paths = requested_paths(&server).await;
    assert!(!paths.contains(&"/novel/beta.html".to_string()));
    assert_eq!(
        paths,
        vec![
            "/list/all/all-newstime-0.html".to_string(),
            "/novel/beta_11.html".to_string(),
            "/novel/beta_12.html".to_string(),
        ]
    );

    let store = FsCheckpointStore::new(&config.output.data_dir).unwrap();
    let detail = store.read_detail("2002").unwrap();
    assert_eq!(detail.total_subitems, 12);
    assert_eq!(detail.completed_subitems, 12);
}

#[tokio::test]
async fn test_modes_run_one_stage_each() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    mount_catalog(&server, &[("gamma", 2)]).await;
    mount_html(&server, "/novel/gamma.html", item_html("3003", "Gamma")).await;
    mount_chapters(&server, "gamma", 1..=2).await;

    let coordinator = Coordinator::new(config.clone(), "test".to_string()).unwrap();
    let store = FsCheckpointStore::new(&config.output.data_dir).unwrap();

    coordinator.run(Mode::Chapters).await.unwrap();
    assert!(requested_paths(&server).await.is_empty());

    coordinator.run(Mode::Urls).await.unwrap();
    assert_eq!(store.read_catalog().unwrap().len(), 1);
    assert!(store.read_detail("3003").unwrap_err().is_not_found());

    coordinator.run(Mode::Details).await.unwrap();
    assert_eq!(store.read_detail("3003").unwrap().completed_subitems, 0);

    coordinator.run(Mode::Chapters).await.unwrap();
    assert_eq!(store.read_detail("3003").unwrap().completed_subitems, 2);
}

#[tokio::test]
async fn test_rate_limited_page_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    Mock::given(method("GET"))
        .and(path("/list/all/all-newstime-0.html"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_catalog(&server, &[("delta", 3)]).await;

    let coordinator = Coordinator::new(config.clone(), "test".to_string()).unwrap();
    let summaries = coordinator.run(Mode::Urls).await.unwrap();
    assert_eq!(summaries[0].processed, 1);
    assert_eq!(requested_paths(&server).await.len(), 2);
}

#[tokio::test]
async fn test_robots_disallow_blocks_item_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), &dir);
    config.scheduler.respect_robots = true;

    mount_html(
        &server,
        "/robots.txt",
        "User-agent: *\nDisallow: /novel/\n".to_string(),
    )
    .await;
    mount_catalog(&server, &[("epsilon", 3)]).await;
    mount_html(&server, "/novel/epsilon.html", item_html("4004", "Epsilon")).await;

    let coordinator = Coordinator::new(config.clone(), "test".to_string()).unwrap();
    let summaries = coordinator.run(Mode::All).await.unwrap();
    assert_eq!(summaries[1].failed, 1);

    let paths = requested_paths(&server).await;
    assert_eq!(paths.first().map(String::as_str), Some("/robots.txt"));
    assert!(!paths.contains(&"/novel/epsilon.html".to_string()));
}
