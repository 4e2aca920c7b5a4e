//! Spray Scanner - Endpoint brute-force scan engine.
//!
//! This crate expands target templates against a word list, probes every
//! candidate URL with a bounded worker pool and keeps the interesting
//! responses. Work is processed in batches of words; progress is
//! checkpointed between batches so a killed run resumes without re-probing
//! anything it already committed.
//!
//! # Features
//!
//! - Batch orchestration with crash-safe resume
//! - Fixed-size worker pool over a bounded work queue
//! - Wildcard, directory and subdomain URL construction
//! - Per-target false-positive detection by response size
//! - Pluggable probe and result sink collaborators
//!
//! # Example
//!
//! ```rust,ignore
//! use spray_scanner::{CsvResultSink, HttpProber, ProgressStore, ScanOrchestrator};
//! use std::sync::Arc;
//!
//! let prober = HttpProber::new(&config.http, config.scan.status_codes.clone())?;
//! let sink = CsvResultSink::open(&config.output.out_dir)?;
//!
//! let mut orchestrator = ScanOrchestrator::new(
//!     config.scan.clone(),
//!     Arc::new(prober),
//!     Arc::new(sink),
//!     ProgressStore::new(&config.output.out_dir),
//! );
//! orchestrator.resume();
//!
//! let summary = orchestrator.run(&targets, &words).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod detector;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod orchestrator;
#[allow(missing_docs)]
pub mod probe;
#[allow(missing_docs)]
pub mod progress;
#[allow(missing_docs)]
pub mod sink;
pub mod stats;
pub mod url_builder;
#[allow(missing_docs)]
pub mod worker;

// Re-export commonly used types
pub use detector::{FalsePositiveDetector, FalsePositiveState, SizeKey};
pub use error::{Result, ScanError};
pub use orchestrator::{RunSummary, ScanOrchestrator};
pub use probe::{HttpProber, ProbeError, ProbeErrorKind, ProbeOutcome, Prober};
pub use progress::{CompletionSet, ProgressStore, RunProgress};
pub use sink::{CsvResultSink, ResultSink, ScanResult};
pub use stats::{ScanStats, StatKind, StatsSnapshot};
pub use url_builder::build_url;
pub use worker::{BatchReport, Disposition, WorkerContext, WorkerPool};
