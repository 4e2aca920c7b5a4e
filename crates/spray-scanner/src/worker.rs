//! Per-batch worker pool.
//!
//! One producer enumerates `targets × words` (targets outer, words inner)
//! into a bounded queue shared by a fixed number of workers. Every pair
//! that is probed is marked complete exactly once, whatever its outcome.

use crate::detector::FalsePositiveDetector;
use crate::error::Result;
use crate::probe::{ProbeErrorKind, ProbeOutcome, Prober};
use crate::progress::CompletionSet;
use crate::sink::{ResultSink, ScanResult};
use crate::stats::{ScanStats, StatKind};
use crate::url_builder::build_url;
use spray_core::{ScanSettings, WorkItem};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Processed-item interval between progress lines.
const PROGRESS_EVERY: usize = 100;

/// What happened to one dequeued work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Already complete or taken by another worker; nothing was requested
    Skipped,
    /// Result handed to the sink
    Persisted,
    /// Response matched a latched false positive
    Filtered,
    /// Probed, but not worth persisting
    Dropped,
}

/// Counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Pairs in the batch
    pub total: usize,
    /// Pairs already complete before the batch started
    pub already_completed: usize,
    /// Distinct pairs probed and marked complete by this batch
    pub processed: usize,
}

impl BatchReport {
    /// Whether the batch was skipped without spawning workers.
    #[must_use]
    pub fn skipped(&self) -> bool {
        self.already_completed == self.total
    }
}

/// Everything a worker touches. Shared by all workers of a run.
pub struct WorkerContext {
    pub settings: ScanSettings,
    pub prober: Arc<dyn Prober>,
    pub sink: Arc<dyn ResultSink>,
    pub completion: Arc<CompletionSet>,
    pub detector: Arc<FalsePositiveDetector>,
    pub stats: Arc<ScanStats>,
}

impl WorkerContext {
    /// Evaluate one work item end to end.
    ///
    /// Items that are complete, or already taken by another worker (a
    /// duplicate in the input), are skipped without side effects.
    pub async fn process(&self, item: &WorkItem) -> Disposition {
        if !self.completion.claim(item) {
            debug!("Skipping {}: already evaluated", item);
            return Disposition::Skipped;
        }

        let url = build_url(&item.target, &item.word, self.settings.mode);
        let outcome = self.prober.probe(&url).await;

        self.tally(&outcome);
        let disposition = self.evaluate(item, &outcome);

        self.completion.mark(&item.target, &item.word);
        disposition
    }

    fn tally(&self, outcome: &ProbeOutcome) {
        self.stats.record(StatKind::Total);

        if let Some(status) = outcome.status_code {
            if self.settings.accepts(status) {
                self.stats.record(StatKind::Success);
            } else {
                self.stats.record(StatKind::Error);
            }
            return;
        }

        match outcome.error.as_ref().map(|e| e.kind) {
            Some(ProbeErrorKind::Timeout) => self.stats.record(StatKind::Timeout),
            // A name that doesn't resolve is the common "not there" answer
            Some(ProbeErrorKind::NameResolution) => {}
            Some(ProbeErrorKind::Transport) | None => self.stats.record(StatKind::Error),
        }
    }

    fn evaluate(&self, item: &WorkItem, outcome: &ProbeOutcome) -> Disposition {
        if let Some(status) = outcome.status_code {
            let length = outcome.content_length;

            if self.detector.should_filter(&item.target, status, length) {
                self.stats.record(StatKind::Filtered);
                debug!("Filtered {} at {} [{}] [{}]", item, outcome.url, status, length);
                return Disposition::Filtered;
            }
            if !self.settings.accepts(status) {
                return Disposition::Dropped;
            }

            info!("Found: {} [{}] [{}]", outcome.url, status, length);
            self.persist(item, outcome);
            if self.detector.track(&item.target, status, length) {
                info!(
                    "Filtering further {} responses of {} bytes for {} as false positives",
                    status, length, item.target
                );
            }
            return Disposition::Persisted;
        }

        match &outcome.error {
            Some(error) if self.sink.should_persist_error(&error.message) => {
                debug!("Error probing {}: {}", outcome.url, error);
                self.persist(item, outcome);
                Disposition::Persisted
            }
            _ => Disposition::Dropped,
        }
    }

    fn persist(&self, item: &WorkItem, outcome: &ProbeOutcome) {
        if let Err(e) = self.sink.write(&ScanResult::from_outcome(item, outcome)) {
            warn!("Error writing result for {}: {}", outcome.url, e);
        }
    }
}

/// Runs batches against a shared [`WorkerContext`].
pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<WorkerContext> {
        &self.ctx
    }

    /// Probe every incomplete pair of `targets × words`.
    ///
    /// Returns once all workers have been joined. On cancellation the
    /// producer stops and workers stop dequeuing; probes already in flight
    /// finish and are committed.
    pub async fn run_batch(
        &self,
        targets: &[String],
        words: &[String],
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let total = targets.len() * words.len();
        let already_completed = self.ctx.completion.count_within(targets, words);

        info!("   Batch progress: {}/{} already completed", already_completed, total);
        if already_completed == total {
            info!("   Batch already completed, skipping...");
            return Ok(BatchReport {
                total,
                already_completed,
                processed: 0,
            });
        }

        // No worker is running between batches.
        self.ctx.completion.release_claims();

        let pending = total - already_completed;
        let threads = self.ctx.settings.threads.clamp(1, pending);
        let (tx, rx) = mpsc::channel::<WorkItem>(threads * 2);
        let rx = Arc::new(Mutex::new(rx));
        let processed = Arc::new(AtomicUsize::new(0));

        let mut tasks = JoinSet::new();

        for _ in 0..threads {
            let ctx = Arc::clone(&self.ctx);
            let rx = Arc::clone(&rx);
            let processed = Arc::clone(&processed);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                loop {
                    let next = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => None,
                            item = rx.recv() => item,
                        }
                    };
                    let Some(item) = next else { break };

                    if ctx.process(&item).await == Disposition::Skipped {
                        continue;
                    }
                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % PROGRESS_EVERY == 0 {
                        info!("   Processed: {}/{}", done, pending);
                    }
                }
            });
        }

        let completion = Arc::clone(&self.ctx.completion);
        let producer_targets = targets.to_vec();
        let producer_words = words.to_vec();
        let producer_cancel = cancel.clone();
        tasks.spawn(async move {
            for target in &producer_targets {
                for word in &producer_words {
                    if completion.contains(target, word) {
                        continue;
                    }
                    let item = WorkItem::new(target.as_str(), word.as_str());
                    tokio::select! {
                        biased;
                        () = producer_cancel.cancelled() => return,
                        sent = tx.send(item) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            // Dropping `tx` here closes the queue and lets workers drain.
        });

        while let Some(joined) = tasks.join_next().await {
            joined?;
        }

        let processed = processed.load(Ordering::Relaxed);
        info!("   Batch completed: {} new requests processed", processed);
        Ok(BatchReport {
            total,
            already_completed,
            processed,
        })
    }
}
