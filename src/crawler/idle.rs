//! Idle/backoff controller
//!
//! Crawling forward regularly overtakes the remote source: identifiers past
//! the newest published item come back empty. A run of `skip_max` empty
//! results is treated as "not published yet" rather than as failures, and
//! turned into a rewind plus an idle pause.

use std::time::Duration;

/// Counts consecutive no-content outcomes
#[derive(Debug, Clone)]
pub struct IdleController {
    skip_max: usize,
    idle_time: Duration,
    consecutive: usize,
}

impl IdleController {
    pub fn new(skip_max: usize, idle_time: Duration) -> Self {
        Self {
            skip_max: skip_max.max(1),
            idle_time,
            consecutive: 0,
        }
    }

    /// Records one empty result
    ///
    /// Returns the size of the run when it reached the threshold; the counter
    /// is reset in that case.
    pub fn record_empty(&mut self) -> Option<usize> {
        self.consecutive += 1;
        if self.consecutive >= self.skip_max {
            let run = self.consecutive;
            self.consecutive = 0;
            Some(run)
        } else {
            None
        }
    }

    /// Resets the counter after a successful extraction
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Current run of empty results
    pub fn consecutive(&self) -> usize {
        self.consecutive
    }

    /// Configured idle duration
    pub fn idle_time(&self) -> Duration {
        self.idle_time
    }

    /// Time left to sleep once a drain took `elapsed`, never negative
    pub fn remaining_idle(&self, elapsed: Duration) -> Duration {
        self.idle_time.saturating_sub(elapsed)
    }
}
