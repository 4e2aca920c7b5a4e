//! Run-wide outcome counters.
//!
//! Workers only ever increment; readers take a [`StatsSnapshot`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which counter an outcome contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// Every probe issued
    Total,
    /// Response with an accepted status code
    Success,
    /// Transport failure or non-accepted status code
    Error,
    /// Probe ran out of time
    Timeout,
    /// Response suppressed as a false positive
    Filtered,
}

/// Thread-safe counter set shared by every worker of a run.
#[derive(Debug, Default)]
pub struct ScanStats {
    total_requests: AtomicU64,
    success_count: AtomicU64,
    error_count: AtomicU64,
    timeout_count: AtomicU64,
    filtered_count: AtomicU64,
}

impl ScanStats {
    /// Create a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment one counter.
    pub fn record(&self, kind: StatKind) {
        let counter = match kind {
            StatKind::Total => &self.total_requests,
            StatKind::Success => &self.success_count,
            StatKind::Error => &self.error_count,
            StatKind::Timeout => &self.timeout_count,
            StatKind::Filtered => &self.filtered_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            timeout_count: self.timeout_count.load(Ordering::Relaxed),
            filtered_count: self.filtered_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Every probe issued
    pub total_requests: u64,
    /// Responses with an accepted status code
    pub success_count: u64,
    /// Transport failures and non-accepted status codes
    pub error_count: u64,
    /// Probes that timed out
    pub timeout_count: u64,
    /// Responses suppressed as false positives
    pub filtered_count: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} success, {} errors, {} timeouts, {} filtered",
            self.total_requests,
            self.success_count,
            self.error_count,
            self.timeout_count,
            self.filtered_count
        )
    }
}
