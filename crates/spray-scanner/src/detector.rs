//! False-positive detection for catch-all responses.
//!
//! Wildcard DNS and catch-all servers answer every guess with the same
//! body. The detector counts how often each exact `(target, status,
//! length)` triple is seen and latches it as filtered once the count
//! reaches the threshold. A latched triple stays filtered for the rest of
//! the run, and across resumes through [`FalsePositiveState`].

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of repeats before a response size is filtered.
pub const DEFAULT_THRESHOLD: u32 = 10;

/// Identity of a response shape for one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SizeKey {
    pub target: String,
    pub status_code: u16,
    pub content_length: i64,
}

impl SizeKey {
    #[must_use]
    pub fn new(target: impl Into<String>, status_code: u16, content_length: i64) -> Self {
        Self {
            target: target.into(),
            status_code,
            content_length,
        }
    }
}

/// Counts and latches, serialized as part of the progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StateRecord", into = "StateRecord")]
pub struct FalsePositiveState {
    size_counts: HashMap<SizeKey, u32>,
    filtered: HashSet<SizeKey>,
    threshold: u32,
}

impl FalsePositiveState {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            size_counts: HashMap::new(),
            filtered: HashSet::new(),
            threshold,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn count(&self, key: &SizeKey) -> u32 {
        self.size_counts.get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_filtered(&self, key: &SizeKey) -> bool {
        self.filtered.contains(key)
    }

    #[must_use]
    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    /// Returns true when this call latched the key.
    fn track(&mut self, key: SizeKey) -> bool {
        let count = self.size_counts.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(1);
        if *count >= self.threshold {
            return self.filtered.insert(key);
        }
        false
    }
}

impl Default for FalsePositiveState {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// On-disk shape: sorted entry lists instead of tuple-keyed maps, which
/// JSON objects cannot express.
#[derive(Serialize, Deserialize)]
struct StateRecord {
    #[serde(default)]
    size_tracking: Vec<SizeCount>,
    #[serde(default)]
    filtered_sizes: Vec<SizeKey>,
    #[serde(default = "default_threshold")]
    threshold: u32,
}

#[derive(Serialize, Deserialize)]
struct SizeCount {
    target: String,
    status_code: u16,
    content_length: i64,
    count: u32,
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

impl From<FalsePositiveState> for StateRecord {
    fn from(state: FalsePositiveState) -> Self {
        let mut size_tracking: Vec<SizeCount> = state
            .size_counts
            .into_iter()
            .map(|(key, count)| SizeCount {
                target: key.target,
                status_code: key.status_code,
                content_length: key.content_length,
                count,
            })
            .collect();
        size_tracking.sort_by(|a, b| {
            (&a.target, a.status_code, a.content_length).cmp(&(
                &b.target,
                b.status_code,
                b.content_length,
            ))
        });

        let mut filtered_sizes: Vec<SizeKey> = state.filtered.into_iter().collect();
        filtered_sizes.sort();

        Self {
            size_tracking,
            filtered_sizes,
            threshold: state.threshold,
        }
    }
}

impl From<StateRecord> for FalsePositiveState {
    fn from(record: StateRecord) -> Self {
        Self {
            size_counts: record
                .size_tracking
                .into_iter()
                .map(|entry| {
                    (
                        SizeKey::new(entry.target, entry.status_code, entry.content_length),
                        entry.count,
                    )
                })
                .collect(),
            filtered: record.filtered_sizes.into_iter().collect(),
            threshold: record.threshold,
        }
    }
}

/// Thread-safe detector shared by all workers of a run.
#[derive(Debug, Default)]
pub struct FalsePositiveDetector {
    state: Mutex<FalsePositiveState>,
}

impl FalsePositiveDetector {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self::from_state(FalsePositiveState::new(threshold))
    }

    #[must_use]
    pub fn from_state(state: FalsePositiveState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FalsePositiveState> {
        // State stays consistent even if a holder panicked mid-update.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one accepted response. Returns true when this call latched
    /// the triple as a false positive.
    pub fn track(&self, target: &str, status_code: u16, content_length: i64) -> bool {
        self.lock()
            .track(SizeKey::new(target, status_code, content_length))
    }

    #[must_use]
    pub fn should_filter(&self, target: &str, status_code: u16, content_length: i64) -> bool {
        self.lock()
            .is_filtered(&SizeKey::new(target, status_code, content_length))
    }

    #[must_use]
    pub fn snapshot(&self) -> FalsePositiveState {
        self.lock().clone()
    }

    /// Replace the whole state, e.g. with one loaded from a progress record.
    pub fn restore(&self, state: FalsePositiveState) {
        *self.lock() = state;
    }

    /// Recount sizes from committed results, keeping every existing latch.
    pub fn rebuild_counts<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, u16, i64)>,
    {
        let mut state = self.lock();
        state.size_counts.clear();
        for (target, status_code, content_length) in entries {
            state.track(SizeKey::new(target, status_code, content_length));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        let detector = FalsePositiveDetector::new(10);
        for _ in 0..9 {
            assert!(!detector.track("a.test", 200, 512));
        }
        assert!(!detector.should_filter("a.test", 200, 512));

        assert!(detector.track("a.test", 200, 512));
        assert!(detector.should_filter("a.test", 200, 512));
    }

    #[test]
    fn test_latch_is_monotonic() {
        let detector = FalsePositiveDetector::new(2);
        detector.track("a.test", 403, 10);
        detector.track("a.test", 403, 10);
        assert!(detector.should_filter("a.test", 403, 10));

        // Further tracking never un-latches, and only the first crossing reports
        for _ in 0..5 {
            assert!(!detector.track("a.test", 403, 10));
            assert!(detector.should_filter("a.test", 403, 10));
        }
    }

    #[test]
    fn test_sizes_tracked_independently() {
        let detector = FalsePositiveDetector::new(3);
        for length in [100, 101, 102, 100, 101] {
            detector.track("a.test", 200, length);
        }
        assert!(!detector.should_filter("a.test", 200, 100));

        detector.track("a.test", 200, 100);
        assert!(detector.should_filter("a.test", 200, 100));
        assert!(!detector.should_filter("a.test", 200, 101));
        assert!(!detector.should_filter("a.test", 200, 102));
        // Same size under another status or target is unaffected
        assert!(!detector.should_filter("a.test", 301, 100));
        assert!(!detector.should_filter("b.test", 200, 100));
    }

    #[test]
    fn test_state_survives_json() {
        let detector = FalsePositiveDetector::new(2);
        detector.track("a.test", 200, 42);
        detector.track("a.test", 200, 42);
        detector.track("b.test", 302, -1);

        let state = detector.snapshot();
        let json = serde_json::to_string(&state).expect("serialize state");
        assert!(json.contains("\"size_tracking\""));
        assert!(json.contains("\"filtered_sizes\""));

        let restored: FalsePositiveState = serde_json::from_str(&json).expect("parse state");
        assert_eq!(restored, state);
        assert_eq!(restored.threshold(), 2);
        assert!(restored.is_filtered(&SizeKey::new("a.test", 200, 42)));
        assert_eq!(restored.count(&SizeKey::new("b.test", 302, -1)), 1);
    }

    #[test]
    fn test_rebuild_counts_keeps_latches() {
        let detector = FalsePositiveDetector::new(2);
        detector.track("a.test", 200, 42);
        detector.track("a.test", 200, 42);
        detector.track("a.test", 200, 7);

        detector.rebuild_counts(vec![("a.test".to_string(), 200, 9)]);
        let state = detector.snapshot();

        assert!(state.is_filtered(&SizeKey::new("a.test", 200, 42)));
        assert_eq!(state.count(&SizeKey::new("a.test", 200, 42)), 0);
        assert_eq!(state.count(&SizeKey::new("a.test", 200, 7)), 0);
        assert_eq!(state.count(&SizeKey::new("a.test", 200, 9)), 1);
    }
}
