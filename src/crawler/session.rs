//! Crawl session: one fetch → extract → post-process → publish attempt
//!
//! A session never decides what happens to a failed target. It only walks
//! the state machine and reports the classified failure; the engine maps it
//! onto an action.

use crate::crawler::classify::CrawlFailure;
use crate::crawler::engine::pause;
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::Fetcher;
use crate::publish::{PublishOutcome, Publisher};
use crate::state::{CrawlTarget, SessionState};
use bytes::Bytes;
use scraper::Html;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Collaborators a session borrows from the engine
pub struct SessionContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub extractor: &'a dyn Extractor,
    pub publisher: &'a mut Publisher,
    pub timeout: Duration,
    pub calm: bool,
    pub cancel: &'a CancellationToken,
}

/// State machine for a single target
#[derive(Debug)]
pub struct CrawlSession {
    target: CrawlTarget,
    state: SessionState,
    address: Option<String>,
}

impl CrawlSession {
    pub fn new(target: CrawlTarget) -> Self {
        Self {
            target,
            state: SessionState::Fetching,
            address: None,
        }
    }

    pub fn target(&self) -> &CrawlTarget {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Address the target resolved to, once resolved
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "invalid session transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(target_id = %self.target, "{} -> {}", self.state, next);
        self.state = next;
    }

    fn failed(&mut self, failure: CrawlFailure) -> CrawlFailure {
        self.advance(SessionState::Failed(failure.kind));
        failure
    }

    /// Runs the session to a terminal state
    ///
    /// # Returns
    ///
    /// * `Ok(PublishOutcome)` - The record went through the publisher
    /// * `Err(CrawlFailure)` - The session failed; `state()` is `Failed(kind)`
    pub async fn run(&mut self, ctx: SessionContext<'_>) -> Result<PublishOutcome, CrawlFailure> {
        let address = ctx
            .extractor
            .resolve_address(&self.target)
            .map_err(|f| self.failed(f))?;
        self.address = Some(address.clone());

        let page = ctx
            .fetcher
            .fetch(&address, ctx.timeout)
            .await
            .map_err(|f| self.failed(f))?;

        self.advance(SessionState::Extracting);
        let extracted = {
            let document = Html::parse_document(&page.body);
            ctx.extractor.extract(&self.target, &document)
        };
        let mut record = extracted.map_err(|f| self.failed(f))?;

        self.advance(SessionState::PostProcessing);
        let extra = ctx.extractor.enrich(&record).map_err(|e| {
            self.failed(CrawlFailure::unclassified(format!(
                "post-processing failed: {:#}",
                e
            )))
        })?;
        record.extend(extra);

        self.advance(SessionState::Publishing);
        let payload = serde_json::to_vec(&record)
            .map_err(|e| self.failed(CrawlFailure::unclassified(e)))?;
        let outcome = ctx.publisher.publish(Bytes::from(payload)).await;

        self.advance(SessionState::Done);
        if ctx.calm {
            if let Some(delay) = ctx.extractor.delay_after(&self.target) {
                pause(delay, ctx.cancel).await;
            }
        }

        Ok(outcome)
    }
}
