//! Integration tests for the HTTP fetcher
//!
//! These tests use wiremock to serve canned responses and check how each
//! outcome is classified.

use driftnet::config::UserAgentConfig;
use driftnet::crawler::{FailureKind, Fetcher, HttpFetcher, ResponseStatus};
use std::time::Duration;
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn create_fetcher() -> HttpFetcher {
    let config = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    HttpFetcher::from_config(&config).expect("Failed to build fetcher")
}

#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/post/1"))
        .and(header_regex("user-agent", "^TestBot/1.0.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><h1>First</h1></body></html>")
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let address = format!("{}/post/1", mock_server.uri());
    let page = create_fetcher().fetch(&address, TIMEOUT).await.unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.url, address);
    assert!(page.body.contains("<h1>First</h1>"));
}

#[tokio::test]
async fn test_fetch_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let address = format!("{}/post/2", mock_server.uri());
    let failure = create_fetcher().fetch(&address, TIMEOUT).await.unwrap_err();

    assert_eq!(
        failure.kind,
        FailureKind::ResponseNotOk(ResponseStatus::Code(404))
    );
    assert!(failure.message.contains("Not Found"));
}

#[tokio::test]
async fn test_fetch_service_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let address = format!("{}/post/3", mock_server.uri());
    let failure = create_fetcher().fetch(&address, TIMEOUT).await.unwrap_err();

    assert_eq!(
        failure.kind,
        FailureKind::ResponseNotOk(ResponseStatus::Code(503))
    );
}

#[tokio::test]
async fn test_blank_body_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n "))
        .mount(&mock_server)
        .await;

    let address = format!("{}/post/4", mock_server.uri());
    let failure = create_fetcher().fetch(&address, TIMEOUT).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::Malformed);
}

#[tokio::test]
async fn test_invalid_utf8_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0xfd]))
        .mount(&mock_server)
        .await;

    let address = format!("{}/post/5", mock_server.uri());
    let failure = create_fetcher().fetch(&address, TIMEOUT).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::Malformed);
}

#[tokio::test]
async fn test_slow_response_is_read_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>late</html>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let address = format!("{}/post/6", mock_server.uri());
    let failure = create_fetcher()
        .fetch(&address, Duration::from_millis(200))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::ReadTimeout);
}

#[tokio::test]
async fn test_refused_connection() {
    // Nothing listens on port 1
    let failure = create_fetcher()
        .fetch("http://127.0.0.1:1/post/7", TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::Connection);
}
