//! Crawler module for identifier-space crawling
//!
//! This module contains the core crawling logic, including:
//! - Target sequencing over a cursor or an explicit queue
//! - HTTP fetching and failure classification
//! - Record extraction through pluggable extractors
//! - Retry tiers, idle backoff and overall engine orchestration

mod classify;
mod engine;
mod extractor;
mod fetcher;
mod idle;
mod retry;
mod sequencer;
mod session;

pub use classify::{
    default_policy, log_level, Action, CrawlFailure, FailureKind, ResponseStatus,
    CONNECTION_SLEEP, OUTAGE_SLEEP, TIMEOUT_SLEEP, UNAVAILABLE_SLEEP,
};
pub use engine::{Engine, FatalError, RunExit, RunSummary};
pub use extractor::{Extractor, Record, SelectorExtractor};
pub use fetcher::{build_http_client, classify_transport_error, FetchedPage, Fetcher, HttpFetcher};
pub use idle::IdleController;
pub use retry::{RetryTiers, DEFAULT_TIERS};
pub use sequencer::Sequencer;
pub use session::{CrawlSession, SessionContext};

use crate::config::Config;
use crate::publish::NatsConnector;
use crate::DriftnetError;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP fetcher and the selector extractor
/// 2. Create the engine and connect the message sink, if one is configured
/// 3. Run the engine until it exhausts its targets, is cancelled or fails
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `cancel` - Token that stops the engine when triggered
///
/// # Returns
///
/// * `Ok(RunSummary)` - The engine stopped; see `RunSummary::exit` for why
/// * `Err(DriftnetError)` - The engine could not be set up
pub async fn crawl(config: Config, cancel: CancellationToken) -> Result<RunSummary, DriftnetError> {
    let fetcher = HttpFetcher::from_config(&config.user_agent)?;
    let extractor = SelectorExtractor::new(&config.extract)?;

    let mut engine = Engine::new(config.engine, fetcher, extractor, cancel)?;

    if let Some(sink) = &config.sink {
        engine
            .configure_sink(NatsConnector, sink.connection_info(), sink.destination())
            .await;
    }

    Ok(engine.run().await)
}
