//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a per-request timeout
//! - Mapping transport errors and response codes onto failure kinds

use crate::config::UserAgentConfig;
use crate::crawler::classify::{CrawlFailure, FailureKind, ResponseStatus};
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error as StdError;
use std::time::Duration;

/// A successfully downloaded document
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Page body, guaranteed to be non-blank UTF-8
    pub body: String,
}

/// Downloads the document behind an address
///
/// Implementations classify every failure: a transport problem becomes a
/// connection, TLS, timeout or no-response kind, a non-success status becomes
/// `ResponseNotOk`, and an unusable body becomes `Malformed`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, address: &str, timeout: Duration) -> Result<FetchedPage, CrawlFailure>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use driftnet::config::UserAgentConfig;
/// use driftnet::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "Driftnet".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the client from the user agent configuration
    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, address: &str, timeout: Duration) -> Result<FetchedPage, CrawlFailure> {
        let response = self
            .client
            .get(address)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, address))?;

        let status = response.status();
        let url = response.url().to_string();

        if !status.is_success() {
            return Err(CrawlFailure::response_not_ok(
                ResponseStatus::Code(status.as_u16()),
                format!(
                    "reason: {}, url: {}",
                    status.canonical_reason().unwrap_or("unknown"),
                    address
                ),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(&e, address))?;

        let body = String::from_utf8(bytes.to_vec())
            .map_err(|e| CrawlFailure::malformed(format!("body of {} is not UTF-8: {}", url, e)))?;

        if body.trim().is_empty() {
            return Err(CrawlFailure::malformed(format!("document is empty: {}", url)));
        }

        Ok(FetchedPage {
            url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Maps a `reqwest` error onto a failure kind
///
/// | Condition | Kind |
/// |-----------|------|
/// | Timeout | ReadTimeout |
/// | TLS/certificate error | Tls |
/// | Connection refused/reset | Connection |
/// | Anything else | ResponseNotOk(NoResponse) |
pub fn classify_transport_error(error: &reqwest::Error, address: &str) -> CrawlFailure {
    let kind = if error.is_timeout() {
        FailureKind::ReadTimeout
    } else if is_tls_error(error) {
        FailureKind::Tls
    } else if error.is_connect() {
        FailureKind::Connection
    } else {
        FailureKind::ResponseNotOk(ResponseStatus::NoResponse)
    };

    CrawlFailure::new(kind, format!("{} ({})", error, address))
}

/// Walks the source chain looking for a TLS failure
fn is_tls_error(error: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        let message = err.to_string().to_lowercase();
        if message.contains("certificate") || message.contains("tls") || message.contains("handshake")
        {
            return true;
        }
        current = err.source();
    }
    false
}
