//! Worker error types.

use thiserror::Error;

use kfx_models::JobId;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Processing is already in progress")]
    Busy,

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job service is shut down")]
    ServiceClosed,

    #[error("Media error: {0}")]
    Media(#[from] kfx_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the request was refused by admission control.
    pub fn is_busy(&self) -> bool {
        matches!(self, WorkerError::Busy)
    }
}
