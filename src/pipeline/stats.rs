// SPDX-License-Identifier: GPL-3.0-only

//! Frame accounting for the pipeline

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free frame counters shared by the delivery callback and the worker
#[derive(Debug, Default)]
pub struct PipelineStats {
    offered: AtomicU64,
    accepted: AtomicU64,
    replaced: AtomicU64,
    ignored: AtomicU64,
    processed: AtomicU64,
    presented: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames delivered by the source
    pub offered: u64,
    /// Frames placed in the pending slot
    pub accepted: u64,
    /// Pending frames discarded in favor of a newer one
    pub replaced: u64,
    /// Frames delivered while the pipeline was not accepting
    pub ignored: u64,
    /// Frames the worker picked up
    pub processed: u64,
    /// Images posted to the display context
    pub presented: u64,
    /// Frames discarded because a stage failed
    pub failed: u64,
}

impl StatsSnapshot {
    /// Frames that never reached the worker
    pub fn dropped(&self) -> u64 {
        self.replaced + self.ignored
    }
}

impl PipelineStats {
    pub(crate) fn record_offered(&self) {
        self.offered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_accepted(&self, replaced: bool) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.replaced.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_presented(&self) {
        self.presented.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            offered: self.offered.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            presented: self.presented.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
