//! Target sequencing
//!
//! The sequencer produces the ordered stream of crawl targets. It runs in one
//! of two modes, fixed at the first pull:
//!
//! - explicit: the queue of targets handed to the engine is drained FIFO and
//!   the stream ends when it is empty
//! - cursor: identifiers are produced by stepping a cursor, and targets pushed
//!   back onto the queue are replayed right after the cursor value that was in
//!   flight when they were re-queued

use crate::state::CrawlTarget;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Explicit,
    Cursor,
}

/// Produces crawl targets from a cursor or an explicit queue
#[derive(Debug)]
pub struct Sequencer {
    /// Current cursor position (the value in flight once yielded)
    current: i64,

    /// Signed step applied after every cursor yield
    step: i64,

    /// Inclusive bound in the direction of travel
    ending: Option<i64>,

    /// External stop signal
    cancel: CancellationToken,

    /// Explicit targets, also used as the re-queue list in cursor mode
    queue: VecDeque<CrawlTarget>,

    /// Fixed on the first pull
    mode: Option<Mode>,

    /// The last yielded target was the cursor value
    cursor_in_flight: bool,

    /// Re-queued targets still to replay before the next cursor value
    replay: usize,
}

impl Sequencer {
    /// Creates a new sequencer
    ///
    /// # Arguments
    ///
    /// * `start` - First cursor value
    /// * `step` - Signed, nonzero step
    /// * `ending` - Optional inclusive bound
    /// * `targets` - Explicit targets; non-empty selects explicit mode
    /// * `cancel` - Cancellation token polled before every cursor yield
    pub fn new(
        start: i64,
        step: i64,
        ending: Option<i64>,
        targets: Vec<CrawlTarget>,
        cancel: CancellationToken,
    ) -> Self {
        debug_assert!(step != 0, "step must be nonzero");
        Self {
            current: start,
            step,
            ending,
            cancel,
            queue: targets.into(),
            mode: None,
            cursor_in_flight: false,
            replay: 0,
        }
    }

    /// Returns the next target, or `None` when the stream has ended
    pub fn next_target(&mut self) -> Option<CrawlTarget> {
        let mode = *self.mode.get_or_insert(if self.queue.is_empty() {
            Mode::Cursor
        } else {
            Mode::Explicit
        });

        match mode {
            Mode::Explicit => self.queue.pop_front(),
            Mode::Cursor => self.next_cursor_target(),
        }
    }

    fn next_cursor_target(&mut self) -> Option<CrawlTarget> {
        if self.cursor_in_flight {
            self.cursor_in_flight = false;
            self.current += self.step;
            // Only what is queued right now; anything re-queued while replaying waits a round
            self.replay = self.queue.len();
        }

        if self.replay > 0 {
            self.replay -= 1;
            if let Some(target) = self.queue.pop_front() {
                return Some(target);
            }
            self.replay = 0;
        }

        if self.is_done() {
            return None;
        }

        self.cursor_in_flight = true;
        Some(CrawlTarget::Id(self.current))
    }

    /// Returns true once the cursor stream must stop
    pub fn is_done(&self) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        match self.ending {
            Some(end) if self.step > 0 => self.current > end,
            Some(end) => self.current < end,
            None => false,
        }
    }

    /// Pushes a target back so it is retried promptly
    pub fn requeue(&mut self, target: CrawlTarget) {
        self.queue.push_back(target);
    }

    /// Appends targets handed to the engine at run time
    pub fn extend<I: IntoIterator<Item = CrawlTarget>>(&mut self, targets: I) {
        self.queue.extend(targets);
    }

    /// Moves the cursor back by `count` steps
    pub fn rewind(&mut self, count: usize) {
        self.current -= count as i64 * self.step;
    }

    /// Current cursor position
    pub fn current(&self) -> i64 {
        self.current
    }

    /// Signed step
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Returns true when crawling toward increasing identifiers
    pub fn is_forward(&self) -> bool {
        self.step > 0
    }

    /// Returns true once the sequencer committed to explicit mode
    pub fn is_explicit(&self) -> bool {
        self.mode == Some(Mode::Explicit)
    }

    /// Number of targets waiting in the explicit/re-queue list
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}
