use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("output directory {path} is missing or not writable: {reason}")]
    OutputDir { path: PathBuf, reason: String },

    #[error("failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("progress serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("result file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("error processing batch {batch_index}: {source}")]
    Batch {
        batch_index: usize,
        #[source]
        source: Box<ScanError>,
    },

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("scan cancelled during batch {batch_index}")]
    Cancelled { batch_index: usize },
}

impl ScanError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
