//! Tiered retry queue
//!
//! Targets that failed transiently are parked in tier 0. Every drain pass
//! replays the tiers from the highest index down; a target that fails again
//! climbs one tier, and a target that fails out of the last tier is dropped.
//! The replay itself needs a crawl session, so the drain loop lives in the
//! engine and this type only owns the buckets.

use crate::state::CrawlTarget;

/// Default number of retry tiers
pub const DEFAULT_TIERS: usize = 3;

/// Escalating LIFO buckets of failed targets
#[derive(Debug, Clone)]
pub struct RetryTiers {
    tiers: Vec<Vec<CrawlTarget>>,
    draining: bool,
}

impl RetryTiers {
    /// Creates `count` empty tiers (at least one)
    pub fn new(count: usize) -> Self {
        Self {
            tiers: vec![Vec::new(); count.max(1)],
            draining: false,
        }
    }

    /// Parks a failed target in tier 0
    ///
    /// Ignored while a drain pass is running: the drain loop escalates the
    /// target it popped itself. Returns whether the target was recorded.
    pub fn record_failure(&mut self, target: CrawlTarget) -> bool {
        if self.draining {
            return false;
        }
        self.tiers[0].push(target);
        true
    }

    /// Marks the start or end of a drain pass
    pub fn set_draining(&mut self, draining: bool) {
        self.draining = draining;
    }

    /// Returns true while a drain pass is running
    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Pops the most recently parked target of a tier
    pub fn pop(&mut self, tier: usize) -> Option<CrawlTarget> {
        self.tiers.get_mut(tier)?.pop()
    }

    /// Moves a target that failed again out of `from` into the next tier
    ///
    /// Returns false when `from` is the last tier and the target is dropped.
    pub fn escalate(&mut self, from: usize, target: CrawlTarget) -> bool {
        match self.tiers.get_mut(from + 1) {
            Some(next) => {
                next.push(target);
                true
            }
            None => false,
        }
    }

    /// Removes the `count` most recently parked tier-0 targets
    pub fn forget_recent(&mut self, count: usize) -> Vec<CrawlTarget> {
        let tier = &mut self.tiers[0];
        let keep = tier.len().saturating_sub(count);
        tier.split_off(keep)
    }

    /// Number of tiers
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Index of the last tier
    pub fn last_index(&self) -> usize {
        self.tiers.len() - 1
    }

    /// Total number of parked targets
    pub fn total_pending(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    /// Returns true when no target is parked
    pub fn is_empty(&self) -> bool {
        self.total_pending() == 0
    }

    /// Per-tier counts, tier 0 first
    pub fn sizes(&self) -> Vec<usize> {
        self.tiers.iter().map(Vec::len).collect()
    }

    /// Parked targets of one tier, oldest first
    pub fn tier(&self, index: usize) -> &[CrawlTarget] {
        self.tiers.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Renders every tier for the final log line
    pub fn describe(&self) -> String {
        let tiers: Vec<String> = self
            .tiers
            .iter()
            .map(|tier| {
                let items: Vec<String> = tier.iter().map(ToString::to_string).collect();
                format!("[{}]", items.join(", "))
            })
            .collect();
        format!("({})", tiers.join(", "))
    }
}

impl Default for RetryTiers {
    fn default() -> Self {
        Self::new(DEFAULT_TIERS)
    }
}
