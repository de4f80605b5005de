use crate::classifier::Classification;
use crate::error::AttachmentFailure;

/// One attachment that ended up in the report store.
#[derive(Debug, Clone)]
pub struct StoredAttachment {
    pub uid: u32,
    pub section: String,
    pub filename: Option<String>,
    pub classification: Classification,
    /// Blob key the report points at.
    pub file_name: String,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Messages returned by the date search.
    pub messages_seen: usize,
    /// UIDs dropped because they were already processed.
    pub messages_skipped: Vec<u32>,
    /// Stored attachments in commit order.
    pub attachments: Vec<StoredAttachment>,
    /// UIDs appended to the ledger by this run.
    pub recorded_uids: Vec<u32>,
    /// Attachments that failed under `skipFailedMessages`. Always empty
    /// under `abortBatch`, which returns an error instead.
    pub failures: Vec<AttachmentFailure>,
}

impl RunReport {
    pub fn attachments_processed(&self) -> usize {
        self.attachments.len()
    }

    pub fn classified_count(&self) -> usize {
        self.attachments
            .iter()
            .filter(|a| a.classification.is_classified())
            .count()
    }

    pub fn unknown_count(&self) -> usize {
        self.attachments_processed() - self.classified_count()
    }
}
