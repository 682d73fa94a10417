//! Integration tests for the crawl engine
//!
//! Most tests drive the engine through a scripted fetcher on a paused clock,
//! so hour-long cool-downs complete instantly. The last test runs a short
//! real crawl against a wiremock server.

use async_trait::async_trait;
use driftnet::config::{load_config, EngineConfig, ExtractConfig, FieldConfig};
use driftnet::crawler::{
    crawl, CrawlFailure, Engine, FailureKind, FetchedPage, Fetcher, ResponseStatus,
    SelectorExtractor,
};
use driftnet::{CrawlTarget, RunExit};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POST: &str = "<html><body><h1>A post</h1></body></html>";
const EMPTY: &str = "<html><body><p>nothing here yet</p></body></html>";

type Responder = dyn Fn(&str, usize, usize) -> Result<&'static str, CrawlFailure> + Send + Sync;

/// Fetcher answering through a closure of (address, attempt for that address, call number)
#[derive(Clone)]
struct ScriptedFetcher {
    respond: Arc<Responder>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFetcher {
    fn new(
        respond: impl Fn(&str, usize, usize) -> Result<&'static str, CrawlFailure>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            respond: Arc::new(respond),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every fetch succeeds with a post
    fn publishing() -> Self {
        Self::new(|_, _, _| Ok(POST))
    }

    /// Path component of every fetched address, in order
    fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|address| address.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, address: &str, _timeout: Duration) -> Result<FetchedPage, CrawlFailure> {
        let (attempt, call) = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(address.to_string());
            let attempt = calls.iter().filter(|a| a.as_str() == address).count();
            (attempt, calls.len())
        };

        (self.respond)(address, attempt, call).map(|body| FetchedPage {
            url: address.to_string(),
            status: 200,
            body: body.to_string(),
        })
    }
}

/// Extraction config: a required `h1` title, posts under site.test
fn create_extract_config() -> ExtractConfig {
    let mut fields = BTreeMap::new();
    fields.insert(
        "title".to_string(),
        FieldConfig {
            selector: "h1".to_string(),
            attribute: None,
            multiple: false,
        },
    );

    ExtractConfig {
        name: "Site".to_string(),
        url_template: Some("https://site.test/post/{id}".to_string()),
        fields,
        required: vec!["title".to_string()],
        skip_if: Some(".removed".to_string()),
        delay_ms: None,
    }
}

fn create_engine(config: EngineConfig, fetcher: &ScriptedFetcher) -> Engine {
    let extractor = SelectorExtractor::new(&create_extract_config()).unwrap();
    Engine::new(config, fetcher.clone(), extractor, CancellationToken::new()).unwrap()
}

fn ids(range: std::ops::RangeInclusive<i64>) -> Vec<String> {
    range.map(|id| id.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_explicit_targets_terminate_after_both_published() {
    let fetcher = ScriptedFetcher::publishing();
    let mut config = EngineConfig::new(0, 1);
    config.targets = vec![
        "https://site.test/post/u1".to_string(),
        "https://site.test/post/u2".to_string(),
    ];
    let mut engine = create_engine(config, &fetcher);

    let summary = engine.run().await;

    assert!(matches!(summary.exit, RunExit::Exhausted));
    assert_eq!(fetcher.calls(), vec!["u1", "u2"]);
    assert_eq!(summary.published, 2);
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.tiers, vec![0, 0, 0]);
    // explicit mode never moves the cursor
    assert_eq!(summary.cursor, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_target_requeued_before_next_cursor_value() {
    let fetcher = ScriptedFetcher::new(|address, attempt, _| {
        if address.ends_with("/101") && attempt == 1 {
            Err(CrawlFailure::response_not_ok(
                ResponseStatus::Code(503),
                "Service Unavailable",
            ))
        } else {
            Ok(POST)
        }
    });
    let mut config = EngineConfig::new(100, 1);
    config.ending_id = Some(103);
    let mut engine = create_engine(config, &fetcher);

    let started = Instant::now();
    let summary = engine.run().await;

    assert_eq!(fetcher.calls(), vec!["100", "101", "101", "102", "103"]);
    assert!(started.elapsed() >= Duration::from_secs(5 * 60));
    assert_eq!(summary.published, 4);
    assert_eq!(summary.pending, 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_run_rewinds_and_idles() {
    // The first 15 fetches find nothing; the site "publishes" after that
    let fetcher = ScriptedFetcher::new(|_, _, call| if call <= 15 { Ok(EMPTY) } else { Ok(POST) });
    let mut config = EngineConfig::new(200, 1);
    config.ending_id = Some(219);
    let mut engine = create_engine(config, &fetcher);

    let started = Instant::now();
    let summary = engine.run().await;

    let mut expected = ids(200..=214);
    expected.extend(ids(200..=219));
    assert_eq!(fetcher.calls(), expected);

    // the idle pause, and no shutdown drain since nothing was left behind
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(started.elapsed() < Duration::from_secs(180));
    assert_eq!(summary.published, 20);
    assert_eq!(summary.pending, 0);
}

#[tokio::test(start_paused = true)]
async fn test_short_empty_run_stays_parked() {
    let fetcher = ScriptedFetcher::new(|address, attempt, _| {
        if address.ends_with("/2") && attempt == 1 {
            Ok(EMPTY)
        } else {
            Ok(POST)
        }
    });
    let mut config = EngineConfig::new(1, 1);
    config.ending_id = Some(3);
    let mut engine = create_engine(config, &fetcher);

    let summary = engine.run().await;

    // 2 waits in tier 0 and is replayed by the shutdown drain
    assert_eq!(fetcher.calls(), vec!["1", "2", "3", "2"]);
    assert_eq!(summary.published, 3);
    assert_eq!(summary.pending, 0);
}

#[tokio::test(start_paused = true)]
async fn test_backward_crawl_consumes_empty_results() {
    let fetcher = ScriptedFetcher::new(|_, _, _| Ok(EMPTY));
    let mut config = EngineConfig::new(20, -1);
    config.ending_id = Some(1);
    config.skip_max = 3;
    let mut engine = create_engine(config, &fetcher);

    let summary = engine.run().await;

    assert_eq!(fetcher.calls().len(), 20);
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.resolved, 20);
    assert_eq!(summary.cursor, 0);
}

#[tokio::test(start_paused = true)]
async fn test_calm_mode_waits_between_targets() {
    let fetcher = ScriptedFetcher::publishing();
    let mut extract = create_extract_config();
    extract.delay_ms = Some(2_000);
    let extractor = SelectorExtractor::new(&extract).unwrap();
    let mut config = EngineConfig::new(5, -1);
    config.ending_id = Some(1);
    let mut engine = Engine::new(config, fetcher.clone(), extractor, CancellationToken::new()).unwrap();

    let started = Instant::now();
    let summary = engine.run().await;

    assert_eq!(summary.published, 5);
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_response_is_fatal_and_drains_before_exit() {
    let fetcher = ScriptedFetcher::new(|address, _, _| {
        if address.ends_with("/2") {
            Err(CrawlFailure::response_not_ok(ResponseStatus::Code(404), "Not Found"))
        } else if address.ends_with("/4") {
            Err(CrawlFailure::malformed("document is empty"))
        } else {
            Ok(POST)
        }
    });
    let mut engine = create_engine(EngineConfig::new(1, 1), &fetcher);

    let started = Instant::now();
    let summary = engine.run().await;

    match &summary.exit {
        RunExit::Fatal(fatal) => {
            assert_eq!(fatal.kind, FailureKind::Malformed);
            assert_eq!(fatal.target, CrawlTarget::Id(4));
            assert_eq!(fatal.address.as_deref(), Some("https://site.test/post/4"));
        }
        other => panic!("expected fatal exit, got {:?}", other),
    }

    // one shutdown pass per tier, then 2 falls out of the last tier
    assert_eq!(fetcher.calls(), vec!["1", "2", "3", "4", "2", "2", "2"]);
    assert!(started.elapsed() >= Duration::from_secs(3 * 180));
    assert_eq!(summary.cursor, 4);
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.published, 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_reports_pending_after_cancel() {
    let fetcher = ScriptedFetcher::new(|address, _, _| {
        if address.ends_with("/1") {
            Err(CrawlFailure::new(FailureKind::UnexpectedShape, "no body element"))
        } else {
            Err(CrawlFailure::new(FailureKind::Offline, "site is down"))
        }
    });
    let cancel = CancellationToken::new();
    let extractor = SelectorExtractor::new(&create_extract_config()).unwrap();
    let mut engine =
        Engine::new(EngineConfig::new(1, 1), fetcher.clone(), extractor, cancel.clone()).unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        trigger.cancel();
    });

    let summary = engine.run().await;

    assert!(matches!(summary.exit, RunExit::Cancelled));
    assert_eq!(fetcher.calls(), vec!["1", "2"]);
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.tiers, vec![2, 0, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_run_with_appends_targets() {
    let fetcher = ScriptedFetcher::publishing();
    let mut engine = create_engine(EngineConfig::new(1, 1), &fetcher);

    let summary = engine
        .run_with(vec![
            CrawlTarget::from("https://site.test/post/a"),
            CrawlTarget::from("https://site.test/post/b"),
        ])
        .await;

    assert!(matches!(summary.exit, RunExit::Exhausted));
    assert_eq!(fetcher.calls(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_crawl_from_config_file() {
    let mock_server = MockServer::start().await;

    for (id, body) in [
        (1, "<html><body><h1>First</h1></body></html>"),
        (2, "<html><body><h1 class=\"removed\">Gone</h1></body></html>"),
        (3, "<html><body><h1>Third</h1></body></html>"),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/post/{}", id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("content-type", "text/html"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let toml = format!(
        r#"
[engine]
starting-id = 1
step = 1
ending-id = 3
check-every = 1

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[extract]
name = "Mock"
url-template = "{}/post/{{id}}"
required = ["title"]
skip-if = ".removed"

[extract.fields]
title = {{ selector = "h1" }}
"#,
        mock_server.uri()
    );
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    let config = load_config(file.path()).unwrap();

    let summary = crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.name, "Mock_1+1");
    assert!(matches!(summary.exit, RunExit::Exhausted));
    assert_eq!(summary.published, 2);
    assert_eq!(summary.resolved, 3);
    assert_eq!(summary.pending, 0);
}
