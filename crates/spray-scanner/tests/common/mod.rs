#![allow(dead_code)]

use async_trait::async_trait;
use spray_core::{ScanMode, ScanSettings};
use spray_scanner::{ProbeOutcome, Prober, Result, ResultSink, ScanResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Scripted prober that records every URL it is asked for.
///
/// Unscripted URLs answer 200 with a length unique to the call, so the
/// false-positive detector never kicks in unless a test wants it to.
#[derive(Default)]
pub struct MockProber {
    scripted: HashMap<String, ProbeOutcome>,
    hang_on: HashSet<String>,
    gated: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    next_length: AtomicI64,
    /// Signalled when a hanging or gated URL is reached
    pub hung: Notify,
    /// Lets a gated URL answer
    pub release: Notify,
}

impl MockProber {
    pub fn new() -> Self {
        Self {
            next_length: AtomicI64::new(1000),
            ..Self::default()
        }
    }

    pub fn respond(mut self, url: &str, status: u16, length: i64) -> Self {
        self.scripted
            .insert(url.to_string(), ProbeOutcome::response(url, status, length));
        self
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.scripted
            .insert(url.to_string(), ProbeOutcome::failure(url, message));
        self
    }

    /// Never answer `url`; notify [`MockProber::hung`] instead.
    pub fn hang(mut self, url: &str) -> Self {
        self.hang_on.insert(url.to_string());
        self
    }

    /// Hold `url` until [`MockProber::release`] is notified; notify
    /// [`MockProber::hung`] on arrival.
    pub fn gate(mut self, url: &str) -> Self {
        self.gated.insert(url.to_string());
        self
    }

    /// Answer every probe after `delay`.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().expect("calls lock").clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.calls.lock().expect("calls lock").push(url.to_string());

        if self.hang_on.contains(url) {
            self.hung.notify_one();
            std::future::pending::<()>().await;
        }
        if self.gated.contains(url) {
            self.hung.notify_one();
            self.release.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.scripted.get(url).cloned().unwrap_or_else(|| {
            let length = self.next_length.fetch_add(1, Ordering::Relaxed);
            ProbeOutcome::response(url, 200, length)
        })
    }
}

/// In-memory sink.
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<ScanResult>>,
}

impl MemorySink {
    pub fn rows(&self) -> Vec<ScanResult> {
        self.rows.lock().expect("rows lock").clone()
    }
}

impl ResultSink for MemorySink {
    fn write(&self, result: &ScanResult) -> Result<()> {
        self.rows.lock().expect("rows lock").push(result.clone());
        Ok(())
    }

    fn load_committed(&self) -> Result<Vec<ScanResult>> {
        Ok(self.rows())
    }
}

pub fn settings(mode: ScanMode, batch_size: usize) -> ScanSettings {
    ScanSettings {
        mode,
        threads: 4,
        batch_size,
        ..ScanSettings::default()
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}
