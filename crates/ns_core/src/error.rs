use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed error: {0}")]
    Feed(String),

    /// The dataset cannot guarantee link uniqueness.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Data not ready: {0}")]
    DataNotReady(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
