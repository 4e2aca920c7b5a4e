//! Resume state: the completion set and the persisted progress record.
//!
//! The progress record (`scan_progress.json`) remembers which batch is next
//! and carries the false-positive state. Which pairs are done is re-derived
//! from the committed results at resume time, so the record never has to
//! list them.

use crate::detector::FalsePositiveState;
use crate::error::{Result, ScanError};
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use spray_core::WorkItem;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the progress record inside the output directory.
pub const PROGRESS_FILE: &str = "scan_progress.json";

/// Checkpointed progress of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    /// Number of batches fully processed; also the index of the next batch
    pub last_completed_batch: usize,
    pub total_batches: usize,
    pub completed_count: usize,
    pub total_work: usize,
    pub start_time: DateTime<Utc>,
    pub last_save_time: DateTime<Utc>,
    #[serde(default)]
    pub false_positive_state: FalsePositiveState,
}

impl RunProgress {
    /// Fresh progress for the given input sizes.
    #[must_use]
    pub fn new(
        target_count: usize,
        word_count: usize,
        batch_size: usize,
        false_positive_state: FalsePositiveState,
    ) -> Self {
        let now = Utc::now();
        let mut progress = Self {
            last_completed_batch: 0,
            total_batches: 0,
            completed_count: 0,
            total_work: 0,
            start_time: now,
            last_save_time: now,
            false_positive_state,
        };
        progress.recompute_totals(target_count, word_count, batch_size);
        progress
    }

    /// Recompute totals from the current inputs (they may differ on resume).
    pub fn recompute_totals(&mut self, target_count: usize, word_count: usize, batch_size: usize) {
        self.total_batches = word_count.div_ceil(batch_size.max(1));
        self.total_work = target_count * word_count;
    }

    /// Completion percentage; an empty run counts as fully complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_complete(&self) -> f64 {
        if self.total_work == 0 {
            return 100.0;
        }
        self.completed_count as f64 / self.total_work as f64 * 100.0
    }
}

/// Keys of every pair already evaluated, in this run or a previous one.
///
/// Grows monotonically; inserting an existing key is a no-op. Workers
/// [`claim`](Self::claim) a pair before probing it so each pair is
/// evaluated by exactly one worker, then [`mark`](Self::mark) it once its
/// result is committed.
#[derive(Debug, Default)]
pub struct CompletionSet {
    keys: DashSet<String>,
    /// Pairs taken by a worker in the current batch
    claimed: DashSet<String>,
}

impl CompletionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, target: &str, word: &str) -> bool {
        self.keys.contains(&WorkItem::key_for(target, word))
    }

    /// Returns true if the pair was not yet marked.
    pub fn mark(&self, target: &str, word: &str) -> bool {
        self.keys.insert(WorkItem::key_for(target, word))
    }

    /// Take exclusive ownership of an item for evaluation. Returns false
    /// if it is already complete or another worker holds it.
    ///
    /// Claims are held until [`release_claims`](Self::release_claims), so a
    /// pair can't be taken again while its first claimer is marking it.
    pub fn claim(&self, item: &WorkItem) -> bool {
        let key = item.key();
        !self.keys.contains(&key) && self.claimed.insert(key)
    }

    /// Drop every claim. Called between batches, when no worker is running.
    pub fn release_claims(&self) {
        self.claimed.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of pairs of `targets × words` already marked.
    #[must_use]
    pub fn count_within(&self, targets: &[String], words: &[String]) -> usize {
        targets
            .iter()
            .map(|target| {
                words
                    .iter()
                    .filter(|word| self.contains(target, word))
                    .count()
            })
            .sum()
    }
}

/// Durable home of the progress record.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    /// Store keeping its record in `out_dir`.
    #[must_use]
    pub fn new(out_dir: &Path) -> Self {
        Self {
            path: out_dir.join(PROGRESS_FILE),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record; `Ok(None)` when there is nothing to resume.
    pub fn load(&self) -> Result<Option<RunProgress>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ScanError::persistence(&self.path, e)),
        };
        let progress = serde_json::from_slice(&data)?;
        Ok(Some(progress))
    }

    /// Atomically replace the record.
    pub fn save(&self, progress: &RunProgress) -> Result<()> {
        let data = serde_json::to_vec_pretty(progress)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp =
            NamedTempFile::new_in(dir).map_err(|e| ScanError::persistence(&self.path, e))?;
        tmp.write_all(&data)
            .and_then(|()| tmp.flush())
            .map_err(|e| ScanError::persistence(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| ScanError::persistence(&self.path, e.error))?;

        tracing::debug!("Saved progress to {}", self.path.display());
        Ok(())
    }

    /// Remove the record after a completed run. A missing record is fine.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ScanError::persistence(&self.path, e)),
        }
    }
}
