//! Durable sinks the ingestion pipeline writes to.
//!
//! The pipeline only sees these traits. [`Database`] backs the report store
//! and the ledger, [`FileStorage`](crate::storage::FileStorage) the blobs.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use crate::db::{mail_repo, report_repo, Database, Report};
use crate::email::FolderInfo;
use crate::error::StorageError;

/// Keyed report collection with last-write-wins upserts.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn upsert_report(&self, report: &Report) -> Result<(), StorageError>;
}

/// Append-only record of fully ingested messages, per folder and
/// UIDVALIDITY.
#[async_trait]
pub trait MailLedger: Send + Sync {
    async fn processed_uids(&self, folder: &FolderInfo) -> Result<HashSet<u32>, StorageError>;

    /// Records `uids` as one atomic batch. Returns the number newly added.
    async fn record_processed(
        &self,
        folder: &FolderInfo,
        uids: &[u32],
    ) -> Result<usize, StorageError>;
}

/// Raw attachment bytes addressed by an opaque key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes a new blob. Fails with [`StorageError::FileExists`] instead of
    /// replacing an existing one.
    async fn write_blob(&self, key: &str, data: &[u8]) -> Result<PathBuf, StorageError>;
}

/// Fresh storage key for an attachment.
pub fn new_blob_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait]
impl ReportStore for Database {
    async fn upsert_report(&self, report: &Report) -> Result<(), StorageError> {
        let record = report.clone();
        self.run_blocking(move |db| report_repo::upsert(db, &record))
            .await?;
        log::debug!(
            "Upserted report '{}' -> {}",
            report.truck_name,
            report.file_name
        );
        Ok(())
    }
}

#[async_trait]
impl MailLedger for Database {
    async fn processed_uids(&self, folder: &FolderInfo) -> Result<HashSet<u32>, StorageError> {
        let scope = folder.clone();
        let (uids, stale) = self
            .run_blocking(move |db| {
                Ok((
                    mail_repo::list_uids(db, &scope)?,
                    mail_repo::stale_validities(db, &scope)?,
                ))
            })
            .await?;

        if !stale.is_empty() {
            log::warn!(
                "UIDVALIDITY of '{}' is now {} (ledger has {:?}); earlier entries no longer apply",
                folder.name,
                folder.uid_validity,
                stale
            );
        }
        Ok(uids)
    }

    async fn record_processed(
        &self,
        folder: &FolderInfo,
        uids: &[u32],
    ) -> Result<usize, StorageError> {
        let scope = folder.clone();
        let batch = uids.to_vec();
        let total = batch.len();
        let added = self
            .run_blocking(move |db| {
                mail_repo::insert_batch(db, &scope, &batch, &Utc::now().to_rfc3339())
            })
            .await?;
        log::debug!(
            "Ledger '{}': {} of {} uids newly recorded",
            folder.name,
            added,
            total
        );
        Ok(added)
    }
}
