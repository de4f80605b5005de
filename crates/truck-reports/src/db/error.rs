//! Failures of the SQLite store behind reports and the ledger.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot create database directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Schema v{version} ({name}) failed to apply: {source}")]
    Migration {
        version: u32,
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The file was written by a newer build with tables this one does not know.
    #[error("Database schema v{found} is newer than this build supports (v{supported})")]
    NewerSchema { found: u32, supported: u32 },

    #[error("Database connection unusable: a thread panicked while holding it")]
    Poisoned,

    #[error("Database task did not complete: {0}")]
    Task(String),
}
