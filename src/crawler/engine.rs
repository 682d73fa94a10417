//! Crawl engine - main crawl orchestration logic
//!
//! This module contains the run loop that coordinates all aspects of the
//! crawling process, including:
//! - Pulling targets from the sequencer and running crawl sessions
//! - Dispatching failures through the policy table
//! - Periodic retry drains and idle/backoff pauses
//! - Graceful shutdown with final draining and a summary

use crate::config::{validate_engine_config, EngineConfig};
use crate::crawler::classify::{log_level, Action, CrawlFailure, FailureKind};
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::idle::IdleController;
use crate::crawler::retry::RetryTiers;
use crate::crawler::sequencer::Sequencer;
use crate::crawler::session::{CrawlSession, SessionContext};
use crate::publish::{ConnectionInfo, Connector, Destination, PublishOutcome, Publisher};
use crate::state::{CrawlTarget, SessionState};
use crate::ConfigError;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Sleeps for `duration` unless cancelled first
///
/// Returns true when the full duration elapsed.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

/// A failure the policy table marked as fatal
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct FatalError {
    pub kind: FailureKind,
    pub message: String,
    pub target: CrawlTarget,
    pub address: Option<String>,
    pub state: SessionState,
    pub backtrace: String,
}

/// Why the run loop stopped
#[derive(Debug, Clone)]
pub enum RunExit {
    /// The sequencer ran out of targets
    Exhausted,

    /// The cancellation token was triggered
    Cancelled,

    /// A fatal failure stopped the loop
    Fatal(FatalError),
}

/// Final state reported when the engine stops
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub name: String,
    pub exit: RunExit,
    pub cursor: i64,
    pub pending: usize,
    pub tiers: Vec<usize>,
    pub attempts: u64,
    pub published: u64,
    pub resolved: u64,
}

impl RunSummary {
    pub fn is_fatal(&self) -> bool {
        matches!(self.exit, RunExit::Fatal(_))
    }
}

/// What became of one crawl attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Went through the publisher
    Published,

    /// Consumed without a record (non-indexable, or empty when backoff is off)
    Consumed,

    /// Pushed back onto the explicit queue
    Requeued,

    /// Parked in the retry tiers, or left for the drain loop to escalate
    Parked,

    /// The empty-run threshold was reached; the cursor has been rewound
    Idle,
}

impl Disposition {
    /// Resolved targets are never retried from the tiers
    fn is_resolved(&self) -> bool {
        matches!(self, Self::Published | Self::Consumed | Self::Requeued)
    }
}

/// Single sequential crawl actor
pub struct Engine {
    name: String,
    sequencer: Sequencer,
    tiers: RetryTiers,
    idle: IdleController,
    fetcher: Box<dyn Fetcher>,
    extractor: Box<dyn Extractor>,
    publisher: Publisher,
    cancel: CancellationToken,
    timeout: Duration,
    check_every: Duration,
    calm: bool,
    next_check: Instant,
    stream_ended: bool,
    attempts: u64,
    published: u64,
    resolved: u64,
}

impl Engine {
    /// Creates a new engine
    ///
    /// # Arguments
    ///
    /// * `config` - The engine configuration
    /// * `fetcher` - Fetch transport
    /// * `extractor` - Site-specific extraction hooks
    /// * `cancel` - External stop signal
    ///
    /// # Returns
    ///
    /// * `Ok(Engine)` - Engine publishing to the local log sink
    /// * `Err(ConfigError)` - The configuration is invalid
    pub fn new(
        config: EngineConfig,
        fetcher: impl Fetcher + 'static,
        extractor: impl Extractor + 'static,
        cancel: CancellationToken,
    ) -> Result<Self, ConfigError> {
        validate_engine_config(&config)?;

        let name = format!("{}_{}{:+}", extractor.name(), config.starting_id, config.step);

        // Duplicates are dropped, first occurrence wins
        let mut seen = HashSet::new();
        let targets: Vec<CrawlTarget> = config
            .targets
            .iter()
            .filter(|url| seen.insert(url.as_str()))
            .map(|url| CrawlTarget::Url(url.clone()))
            .collect();

        let sequencer = Sequencer::new(
            config.starting_id,
            config.step,
            config.ending_id,
            targets,
            cancel.clone(),
        );

        Ok(Self {
            publisher: Publisher::new(name.clone()),
            name,
            sequencer,
            tiers: RetryTiers::new(config.tiers),
            idle: IdleController::new(config.skip_max, config.idle_time()),
            fetcher: Box::new(fetcher),
            extractor: Box::new(extractor),
            cancel,
            timeout: config.timeout(),
            check_every: config.check_every(),
            calm: config.calm_mode(),
            next_check: Instant::now(),
            stream_ended: false,
            attempts: 0,
            published: 0,
            resolved: 0,
        })
    }

    /// Connects the publisher to a message sink
    ///
    /// Falls back to the local log sink when the sink is unreachable.
    pub async fn configure_sink(
        &mut self,
        connector: impl Connector + 'static,
        connection: ConnectionInfo,
        destination: Destination,
    ) {
        self.publisher
            .configure(Box::new(connector), connection, destination)
            .await;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cursor(&self) -> i64 {
        self.sequencer.current()
    }

    pub fn tiers(&self) -> &RetryTiers {
        &self.tiers
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Appends targets and runs the engine
    pub async fn run_with(&mut self, targets: Vec<CrawlTarget>) -> RunSummary {
        self.sequencer.extend(targets);
        self.run().await
    }

    /// Runs the main crawl loop until the targets run out, the token is
    /// cancelled or a fatal failure occurs, then shuts down gracefully
    pub async fn run(&mut self) -> RunSummary {
        tracing::info!(
            engine = %self.name,
            "Starting crawl at {} (step {:+}, calm: {})",
            self.sequencer.current(),
            self.sequencer.step(),
            self.calm
        );
        self.next_check = Instant::now() + self.check_every;

        self.stream_ended = false;
        let exit = loop {
            if self.cancel.is_cancelled() {
                break RunExit::Cancelled;
            }

            let Some(target) = self.sequencer.next_target() else {
                break if self.cancel.is_cancelled() {
                    RunExit::Cancelled
                } else {
                    RunExit::Exhausted
                };
            };

            if let Err(fatal) = self.advance(target).await {
                break RunExit::Fatal(fatal);
            }
        };

        // Nothing pulls from the sequencer any more
        self.stream_ended = true;
        self.log_exit(&exit);
        self.shutdown(&exit).await;
        self.summary(exit)
    }

    /// Crawls one target pulled from the sequencer and runs the periodic drain
    async fn advance(&mut self, target: CrawlTarget) -> Result<(), FatalError> {
        match self.crawl(target).await? {
            Disposition::Published | Disposition::Consumed => self.idle.reset(),
            Disposition::Idle => self.idle_pause().await?,
            Disposition::Requeued | Disposition::Parked => {}
        }

        if Instant::now() > self.next_check {
            let before = self.tiers.total_pending();
            self.drain().await?;
            self.next_check = Instant::now() + self.check_every;
            tracing::info!(
                engine = %self.name,
                "{} checked skips. current id: {} ({}/{})",
                self.name,
                self.sequencer.current(),
                self.tiers.total_pending(),
                before
            );
        }

        Ok(())
    }

    /// Runs one crawl session and dispatches its outcome
    async fn crawl(&mut self, target: CrawlTarget) -> Result<Disposition, FatalError> {
        self.attempts += 1;
        let mut session = CrawlSession::new(target);
        let result = session
            .run(SessionContext {
                fetcher: self.fetcher.as_ref(),
                extractor: self.extractor.as_ref(),
                publisher: &mut self.publisher,
                timeout: self.timeout,
                calm: self.calm,
                cancel: &self.cancel,
            })
            .await;

        let disposition = match result {
            Ok(outcome) => {
                if outcome != PublishOutcome::Dropped {
                    self.published += 1;
                }
                Disposition::Published
            }
            Err(failure) => self.dispatch(&session, failure).await?,
        };

        if disposition.is_resolved() {
            self.resolved += 1;
        }
        Ok(disposition)
    }

    /// Carries out the action the policy table picked for a failure
    async fn dispatch(
        &mut self,
        session: &CrawlSession,
        failure: CrawlFailure,
    ) -> Result<Disposition, FatalError> {
        let target = session.target().clone();

        if let Some(level) = log_level(&failure.kind) {
            self.log_failure(level, session, &failure);
        }

        let action = self.extractor.policy(&failure.kind);
        let disposition = match action {
            Action::Fatal => {
                return Err(FatalError {
                    kind: failure.kind,
                    message: failure.message,
                    target,
                    address: session.address().map(str::to_string),
                    state: session.state(),
                    backtrace: std::backtrace::Backtrace::force_capture().to_string(),
                })
            }
            Action::RetryEscalate { .. } => {
                self.tiers.record_failure(target);
                Disposition::Parked
            }
            // After the run loop the queue is never pulled again; let the drain escalate instead
            Action::RequeueImmediate { .. } if self.stream_ended => Disposition::Parked,
            Action::RequeueImmediate { .. } => {
                self.sequencer.requeue(target);
                Disposition::Requeued
            }
            Action::Backoff => self.backoff(target),
            Action::Suppressed => Disposition::Consumed,
        };

        if let Some(sleep) = action.sleep() {
            tracing::info!(
                engine = %self.name,
                "{} cooling down for {}s after {}",
                self.name,
                sleep.as_secs(),
                failure.kind
            );
            pause(sleep, &self.cancel).await;
        }

        Ok(disposition)
    }

    /// Handles a no-content outcome
    fn backoff(&mut self, target: CrawlTarget) -> Disposition {
        if !self.sequencer.is_forward() || self.tiers.is_draining() {
            return Disposition::Consumed;
        }

        self.tiers.record_failure(target);

        // Explicit targets are retried by the drains but never rewind anything
        if self.sequencer.is_explicit() {
            return Disposition::Parked;
        }

        match self.idle.record_empty() {
            Some(run) => {
                let before = self.tiers.total_pending();
                self.tiers.forget_recent(run);
                self.sequencer.rewind(run);
                tracing::info!(
                    engine = %self.name,
                    "{} encountered {} urls without submissions, sleeping for {}s. current id: {} ({}/{})",
                    self.name,
                    run,
                    self.idle.idle_time().as_secs(),
                    self.sequencer.current(),
                    self.tiers.total_pending(),
                    before
                );
                Disposition::Idle
            }
            None => Disposition::Parked,
        }
    }

    /// Drains the retry tiers once, then sleeps off the rest of the idle time
    async fn idle_pause(&mut self) -> Result<(), FatalError> {
        let started = Instant::now();
        self.drain().await?;

        let remaining = self.idle.remaining_idle(started.elapsed());
        if !remaining.is_zero() {
            pause(remaining, &self.cancel).await;
        }
        Ok(())
    }

    /// Replays every parked target once
    ///
    /// Tiers are processed from the last down to 0 so targets escalated during
    /// this pass are not replayed again until the next one.
    pub async fn drain(&mut self) -> Result<(), FatalError> {
        self.tiers.set_draining(true);
        let result = self.drain_tiers().await;
        self.tiers.set_draining(false);
        result
    }

    async fn drain_tiers(&mut self) -> Result<(), FatalError> {
        for tier in (0..self.tiers.len()).rev() {
            loop {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                let Some(target) = self.tiers.pop(tier) else {
                    break;
                };

                let disposition = self.crawl(target.clone()).await?;
                if !disposition.is_resolved() && !self.tiers.escalate(tier, target.clone()) {
                    tracing::debug!(
                        engine = %self.name,
                        "Dropping {} after {} retry tiers",
                        target,
                        self.tiers.len()
                    );
                }
            }
        }
        Ok(())
    }

    /// Drains up to one pass per tier, then logs the final state
    async fn shutdown(&mut self, exit: &RunExit) {
        if !matches!(exit, RunExit::Cancelled) {
            let mut passes = self.tiers.len();
            while passes > 0 && !self.tiers.is_empty() {
                if !pause(self.check_every, &self.cancel).await {
                    break;
                }
                if let Err(fatal) = self.drain().await {
                    tracing::error!(
                        engine = %self.name,
                        error = %fatal,
                        info = %format!("{} has shut down.", self.name),
                        crawl_target = %fatal.target,
                        cursor = self.sequencer.current(),
                        tiers = ?self.tiers.sizes(),
                        "Fatal failure while draining retry tiers"
                    );
                    break;
                }
                passes -= 1;
            }
        }

        let pending = self.pending();
        if pending > 0 {
            tracing::error!(
                engine = %self.name,
                "{} gracefully finished. current id: {}, {} skipped items left: {} (queued: {})",
                self.name,
                self.sequencer.current(),
                pending,
                self.tiers.describe(),
                self.sequencer.queued()
            );
        } else {
            tracing::info!(
                engine = %self.name,
                "{} gracefully finished. current id: {}, 0 skipped items left",
                self.name,
                self.sequencer.current()
            );
        }
    }

    fn log_exit(&self, exit: &RunExit) {
        match exit {
            RunExit::Fatal(fatal) => {
                let crash_info = serde_json::Value::Object(self.extractor.crash_info());
                tracing::error!(
                    engine = %self.name,
                    error = %fatal,
                    info = %format!("{} gracefully shutting down.", self.name),
                    crawl_target = %fatal.target,
                    address = fatal.address.as_deref().unwrap_or(""),
                    state = %fatal.state,
                    cursor = self.sequencer.current(),
                    tiers = ?self.tiers.sizes(),
                    crash_info = %crash_info,
                    stacktrace = %fatal.backtrace,
                    "Fatal crawl failure"
                );
            }
            RunExit::Exhausted | RunExit::Cancelled => {
                tracing::info!(
                    engine = %self.name,
                    "{} gracefully shutting down ({}). current id: {}, skips: {:?} ({})",
                    self.name,
                    if matches!(exit, RunExit::Cancelled) {
                        "cancelled"
                    } else {
                        "no targets left"
                    },
                    self.sequencer.current(),
                    self.tiers.sizes(),
                    self.tiers.total_pending()
                );
            }
        }
    }

    fn log_failure(&self, level: Level, session: &CrawlSession, failure: &CrawlFailure) {
        let target = session.target();
        let address = session.address().unwrap_or("");
        let cursor = self.sequencer.current();

        if level == Level::ERROR {
            tracing::error!(engine = %self.name, error = %failure, crawl_target = %target, address, cursor, "{} encountered {} on {}", self.name, failure.kind, target);
        } else if level == Level::WARN {
            tracing::warn!(engine = %self.name, error = %failure, crawl_target = %target, address, cursor, "{} encountered {} on {}", self.name, failure.kind, target);
        } else {
            tracing::info!(engine = %self.name, error = %failure, crawl_target = %target, address, cursor, "{} encountered {} on {}", self.name, failure.kind, target);
        }
    }

    /// Targets left in the retry tiers plus re-queued targets never replayed
    fn pending(&self) -> usize {
        self.tiers.total_pending() + self.sequencer.queued()
    }

    fn summary(&self, exit: RunExit) -> RunSummary {
        RunSummary {
            name: self.name.clone(),
            exit,
            cursor: self.sequencer.current(),
            pending: self.pending(),
            tiers: self.tiers.sizes(),
            attempts: self.attempts,
            published: self.published,
            resolved: self.resolved,
        }
    }
}
