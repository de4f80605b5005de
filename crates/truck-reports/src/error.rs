use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::email::EmailError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Email(#[from] EmailError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Operation '{operation}' timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Ingestion cancelled during '{operation}'")]
    Cancelled { operation: String },

    #[error("{stage} failed for {} attachment(s): {}", .failures.len(), summarize(.failures))]
    Batch {
        stage: BatchStage,
        failures: Vec<AttachmentFailure>,
    },
}

impl From<crate::db::DatabaseError> for IngestError {
    fn from(err: crate::db::DatabaseError) -> Self {
        IngestError::Storage(StorageError::Database(err))
    }
}

/// Pipeline stage a batch failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Fetch,
    Commit,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStage::Fetch => f.write_str("Attachment fetch"),
            BatchStage::Commit => f.write_str("Report commit"),
        }
    }
}

/// One attachment that could not be fetched or committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFailure {
    pub uid: u32,
    pub section: String,
    pub filename: Option<String>,
    pub error: String,
}

impl fmt::Display for AttachmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uid {} part {} ({}): {}",
            self.uid,
            self.section,
            self.filename.as_deref().unwrap_or("<no filename>"),
            self.error
        )
    }
}

fn summarize(failures: &[AttachmentFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to resolve secret: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
