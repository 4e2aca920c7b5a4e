//! Batch orchestrator.
//!
//! This module provides the `ScanOrchestrator`, which splits the word list
//! into batches, runs each batch through the worker pool and checkpoints
//! progress between batches so an interrupted run can pick up where it
//! stopped.

use crate::detector::FalsePositiveDetector;
use crate::error::{Result, ScanError};
use crate::probe::Prober;
use crate::progress::{CompletionSet, ProgressStore, RunProgress};
use crate::sink::ResultSink;
use crate::stats::{ScanStats, StatsSnapshot};
use crate::worker::{WorkerContext, WorkerPool};
use chrono::Utc;
use serde::Serialize;
use spray_core::ScanSettings;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Final accounting of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    /// Counters accumulated by this process
    pub stats: StatsSnapshot,
    /// Pairs of the current inputs known to be done
    pub completed_count: usize,
    /// `targets × words` for the current inputs
    pub total_work: usize,
    pub total_batches: usize,
    /// The run found nothing left to do when it started
    pub already_complete: bool,
}

impl RunSummary {
    fn from_progress(progress: &RunProgress, stats: StatsSnapshot, already_complete: bool) -> Self {
        Self {
            stats,
            completed_count: progress.completed_count,
            total_work: progress.total_work,
            total_batches: progress.total_batches,
            already_complete,
        }
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

/// Drives a whole scan, one batch of words at a time.
pub struct ScanOrchestrator {
    settings: ScanSettings,
    pool: WorkerPool,
    store: ProgressStore,
    /// Loaded or in-flight progress
    progress: Option<RunProgress>,
    cancel: CancellationToken,
}

impl ScanOrchestrator {
    /// Create an orchestrator with a fresh completion set and detector.
    #[must_use]
    pub fn new(
        settings: ScanSettings,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn ResultSink>,
        store: ProgressStore,
    ) -> Self {
        let detector = FalsePositiveDetector::new(settings.false_positive_threshold);
        let ctx = WorkerContext {
            settings: settings.clone(),
            prober,
            sink,
            completion: Arc::new(CompletionSet::new()),
            detector: Arc::new(detector),
            stats: Arc::new(ScanStats::new()),
        };

        Self {
            settings,
            pool: WorkerPool::new(Arc::new(ctx)),
            store,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that stops the run after the in-flight probes finish.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.pool.context().stats.snapshot()
    }

    /// Loaded or most recent progress, if any.
    #[must_use]
    pub fn progress(&self) -> Option<&RunProgress> {
        self.progress.as_ref()
    }

    #[must_use]
    pub fn completion(&self) -> &CompletionSet {
        &self.pool.context().completion
    }

    #[must_use]
    pub fn detector(&self) -> &FalsePositiveDetector {
        &self.pool.context().detector
    }

    /// Load the progress record and the detector state it carries.
    ///
    /// Returns `Ok(false)` when there is no record, i.e. a fresh start.
    pub fn load_progress(&mut self) -> Result<bool> {
        let Some(progress) = self.store.load()? else {
            return Ok(false);
        };

        info!(
            "Loaded progress: batch {}/{}, {}/{} completed",
            progress.last_completed_batch,
            progress.total_batches,
            progress.completed_count,
            progress.total_work
        );
        self.pool
            .context()
            .detector
            .restore(progress.false_positive_state.clone());
        self.progress = Some(progress);
        Ok(true)
    }

    /// Mark every committed result as complete and recount response sizes
    /// from them. Returns the number of pairs newly marked.
    pub fn load_completed_work(&self) -> Result<usize> {
        let ctx = self.pool.context();
        let committed = ctx.sink.load_committed()?;

        let marked = committed
            .iter()
            .filter(|row| ctx.completion.mark(&row.target, &row.word))
            .count();

        ctx.detector.rebuild_counts(
            committed
                .into_iter()
                .filter(|row| row.is_response() && self.settings.accepts(row.status_code))
                .map(|row| (row.target, row.status_code, row.content_length)),
        );

        info!("Loaded {} completed work items", marked);
        Ok(marked)
    }

    /// Restore whatever a previous run left behind. Unreadable artifacts
    /// are logged and treated as absent.
    pub fn resume(&mut self) {
        if let Err(e) = self.load_progress() {
            warn!("Could not load progress, starting fresh: {}", e);
        }
        if let Err(e) = self.load_completed_work() {
            warn!("Could not load completed work: {}", e);
        }
    }

    /// Scan every pair of `targets × words` not already complete.
    pub async fn run(&mut self, targets: &[String], words: &[String]) -> Result<RunSummary> {
        let batch_size = self.settings.batch_size.max(1);

        let mut progress = match self.progress.take() {
            Some(mut progress) => {
                progress.recompute_totals(targets.len(), words.len(), batch_size);
                progress.last_completed_batch =
                    progress.last_completed_batch.min(progress.total_batches);
                progress
            }
            None => RunProgress::new(
                targets.len(),
                words.len(),
                batch_size,
                self.pool.context().detector.snapshot(),
            ),
        };
        // Batches before the checkpoint were fully evaluated, whether or not
        // their pairs left a committed result behind.
        let checkpointed = (progress.last_completed_batch * batch_size).min(words.len());
        for target in targets {
            for word in &words[..checkpointed] {
                self.completion().mark(target, word);
            }
        }
        progress.completed_count = self.completion().count_within(targets, words);

        if progress.completed_count == progress.total_work {
            info!("Scan already completed!");
            self.clear_progress();
            let summary = RunSummary::from_progress(&progress, self.stats(), true);
            self.progress = Some(progress);
            return Ok(summary);
        }

        info!(
            "Starting scan: {} targets x {} words in {} batches of {}",
            targets.len(),
            words.len(),
            progress.total_batches,
            batch_size
        );
        if progress.last_completed_batch > 0 {
            info!(
                "Resuming from batch {}/{}",
                progress.last_completed_batch + 1,
                progress.total_batches
            );
        }

        for batch_index in progress.last_completed_batch..progress.total_batches {
            let start = batch_index * batch_size;
            let end = (start + batch_size).min(words.len());
            info!(
                "Processing batch {}/{} (words {}-{})",
                batch_index + 1,
                progress.total_batches,
                start + 1,
                end
            );

            let batch_cancel = self.cancel.child_token();
            let outcome = self
                .pool
                .run_batch(targets, &words[start..end], &batch_cancel)
                .await;
            progress.false_positive_state = self.pool.context().detector.snapshot();

            let report = match outcome {
                Ok(report) => report,
                Err(source) => {
                    self.progress = Some(progress);
                    return Err(ScanError::Batch {
                        batch_index,
                        source: Box::new(source),
                    });
                }
            };
            // Every processed pair is a distinct new mark inside the inputs.
            progress.completed_count =
                (progress.completed_count + report.processed).min(progress.total_work);

            if self.cancel.is_cancelled() {
                // The interrupted batch stays pending; its finished pairs
                // are recovered from the results on resume.
                self.save_progress(&mut progress);
                self.progress = Some(progress);
                warn!("Scan cancelled during batch {}", batch_index + 1);
                return Err(ScanError::Cancelled { batch_index });
            }

            progress.last_completed_batch = batch_index + 1;
            self.save_progress(&mut progress);

            info!(
                "Batch {} completed. Progress: {}/{} ({:.2}%)",
                batch_index + 1,
                progress.completed_count,
                progress.total_work,
                progress.percent_complete()
            );
        }

        // Exact recount once per run; repeated targets or words make the
        // running total drift.
        progress.completed_count = self.completion().count_within(targets, words);
        self.clear_progress();
        let summary = RunSummary::from_progress(&progress, self.stats(), false);
        self.progress = Some(progress);
        Ok(summary)
    }

    fn save_progress(&self, progress: &mut RunProgress) {
        progress.last_save_time = Utc::now();
        if let Err(e) = self.store.save(progress) {
            warn!("Failed to save progress: {}", e);
        }
    }

    fn clear_progress(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to remove progress record: {}", e);
        }
    }
}
