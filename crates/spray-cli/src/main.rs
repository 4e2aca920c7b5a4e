//! # api-spray
//!
//! Brute-forces API endpoints, directories or subdomains for a list of
//! targets. Progress is checkpointed per batch of words; rerun with
//! `--resume` to continue an interrupted scan.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use spray_core::{load_lines, AppConfig, ScanMode};
use spray_scanner::{
    CsvResultSink, HttpProber, ProgressStore, RunSummary, ScanError, ScanOrchestrator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "api-spray", version)]
#[command(about = "Concurrent API endpoint brute-force scanner with resumable progress")]
struct Cli {
    /// File with one target per line
    #[arg(short = 't', long)]
    targets: PathBuf,

    /// File with one word per line
    #[arg(short = 'w', long)]
    wordlist: PathBuf,

    /// wildcards, directories or subdomains
    #[arg(short = 'm', long)]
    mode: Option<String>,

    /// Concurrent workers
    #[arg(long)]
    threads: Option<usize>,

    /// Words per batch
    #[arg(long = "batch")]
    batch_size: Option<usize>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Output directory
    #[arg(short = 'o', long = "outdir")]
    out_dir: Option<PathBuf>,

    /// Do not fall back to plain HTTP when HTTPS fails
    #[arg(long)]
    disable_http: bool,

    /// Resume from the progress and results in the output directory
    #[arg(long)]
    resume: bool,

    /// Retries per request
    #[arg(long)]
    retries: Option<u32>,

    /// User agent string
    #[arg(long = "user-agent")]
    user_agent: Option<String>,

    /// Follow redirects
    #[arg(long)]
    follow_redirects: Option<bool>,

    /// Accepted status codes, comma separated
    #[arg(long, value_delimiter = ',')]
    status_codes: Option<Vec<u16>>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) -> anyhow::Result<()> {
        if let Some(mode) = &self.mode {
            config.scan.mode = mode.parse::<ScanMode>()?;
        }
        if let Some(threads) = self.threads {
            config.scan.threads = threads;
        }
        if let Some(batch_size) = self.batch_size {
            config.scan.batch_size = batch_size;
        }
        if let Some(codes) = &self.status_codes {
            config.scan.status_codes.clone_from(codes);
        }
        if let Some(timeout) = self.timeout {
            config.http.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            config.http.retries = retries;
        }
        if let Some(user_agent) = &self.user_agent {
            config.http.user_agent.clone_from(user_agent);
        }
        if let Some(follow) = self.follow_redirects {
            config.http.follow_redirects = follow;
        }
        if self.disable_http {
            config.http.disable_http_fallback = true;
        }
        if let Some(out_dir) = &self.out_dir {
            config.output.out_dir.clone_from(out_dir);
        }
        Ok(())
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn print_banner(config: &AppConfig, targets: usize, words: usize) {
    println!("\n=== API Spray Scanner ===");
    println!("Mode: {}", config.scan.mode.as_str().to_uppercase());
    println!(
        "Targets: {} | Words: {} | Threads: {} | Batch: {}",
        targets, words, config.scan.threads, config.scan.batch_size
    );
    println!(
        "Timeout: {}s | Status Codes: {:?}",
        config.http.timeout_secs, config.scan.status_codes
    );
    if config.http.disable_http_fallback {
        println!("HTTP fallback: DISABLED");
    }
    println!("Started: {}\n", Local::now().format("%H:%M:%S"));
}

fn print_summary(summary: &RunSummary, out_dir: &std::path::Path) {
    println!("Scan completed: {}", Local::now().format("%H:%M:%S"));
    println!("Final stats: {}", summary.stats);
    println!(
        "Completed: {}/{} ({:.2}%)",
        summary.completed_count,
        summary.total_work,
        summary.percent_complete()
    );
    println!("Results saved in: {}", out_dir.display());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::load_with_env(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config)?;
    config.validate().context("Invalid configuration")?;

    let targets = load_lines(&cli.targets)
        .await
        .with_context(|| format!("Failed to load targets from {}", cli.targets.display()))?;
    let words = load_lines(&cli.wordlist)
        .await
        .with_context(|| format!("Failed to load wordlist from {}", cli.wordlist.display()))?;

    let out_dir = config.output.out_dir.clone();
    let sink = CsvResultSink::open(&out_dir).context("Failed to initialize output")?;
    let prober = HttpProber::new(&config.http, config.scan.status_codes.clone())
        .context("Failed to create HTTP client")?;

    let mut orchestrator = ScanOrchestrator::new(
        config.scan.clone(),
        Arc::new(prober),
        Arc::new(sink),
        ProgressStore::new(&out_dir),
    );
    if cli.resume {
        orchestrator.resume();
    }

    print_banner(&config, targets.len(), words.len());

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight requests...");
            cancel.cancel();
        }
    });

    match orchestrator.run(&targets, &words).await {
        Ok(summary) => {
            print_summary(&summary, &out_dir);
            Ok(())
        }
        Err(ScanError::Cancelled { batch_index }) => {
            info!(
                "Scan interrupted in batch {}; rerun with --resume to continue",
                batch_index + 1
            );
            println!("Final stats: {}", orchestrator.stats());
            Ok(())
        }
        Err(e) => {
            error!("Scan failed: {}", e);
            println!("Final stats: {}", orchestrator.stats());
            Err(e.into())
        }
    }
}
