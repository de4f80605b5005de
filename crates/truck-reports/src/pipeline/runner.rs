use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, info, info_span, warn, Instrument};

use crate::classifier::{classify_attachment, Classification};
use crate::config::FailurePolicy;
use crate::db::Report;
use crate::email::{
    attachment_parts, fetch_attachment, filter_unprocessed, AttachmentPart, ExtractedAttachment,
    MailboxConnector, MailboxSession,
};
use crate::error::{AttachmentFailure, BatchStage, IngestError, Result};
use crate::store::{new_blob_key, BlobStore, MailLedger, ReportStore};

use super::config::PipelineConfig;
use super::report::{RunReport, StoredAttachment};

/// An attachment with its classification and blob key, ready to commit.
struct Staged {
    attachment: ExtractedAttachment,
    classification: Classification,
    key: String,
}

impl Staged {
    fn to_report(&self) -> Report {
        let original_name = match &self.classification {
            Classification::Classified { original_name, .. } => Some(original_name.clone()),
            Classification::Unknown { .. } => self.attachment.filename.clone(),
        };
        Report {
            truck_name: self.classification.report_key(),
            file_name: self.key.clone(),
            original_name,
            mail_uid: self.attachment.uid,
            stored_at: Utc::now().to_rfc3339(),
        }
    }

    fn failure(&self, error: &IngestError) -> AttachmentFailure {
        AttachmentFailure {
            uid: self.attachment.uid,
            section: self.attachment.section.to_string(),
            filename: self.attachment.filename.clone(),
            error: error.to_string(),
        }
    }
}

/// Where a run gets the uids it must not process again.
enum SkipSource<'a> {
    /// The ledger entries for the selected folder and its UIDVALIDITY.
    Ledger,
    Given(&'a HashSet<u32>),
}

/// Pulls new report attachments out of the mailbox and files them.
///
/// One run connects, searches the configured date window, fetches and
/// classifies every attachment of the messages not yet processed, stores
/// blob then report for each, and finally appends the messages to the
/// ledger. Nothing reaches the ledger unless everything before it
/// succeeded (or, under [`FailurePolicy::SkipFailedMessages`], only the
/// messages that fully succeeded do).
///
/// Runs must not overlap against the same mailbox and ledger.
pub struct IngestPipeline {
    connector: Arc<dyn MailboxConnector>,
    reports: Arc<dyn ReportStore>,
    ledger: Arc<dyn MailLedger>,
    blobs: Arc<dyn BlobStore>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl IngestPipeline {
    pub fn new(
        connector: Arc<dyn MailboxConnector>,
        reports: Arc<dyn ReportStore>,
        ledger: Arc<dyn MailLedger>,
        blobs: Arc<dyn BlobStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            connector,
            reports,
            ledger,
            blobs,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to abort in-flight runs.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ingests everything the ledger has not recorded yet for the
    /// configured folder.
    pub async fn ingest_new(&self) -> Result<RunReport> {
        self.ingest_from(SkipSource::Ledger).await
    }

    /// Ingests every message in the search window whose uid is not in
    /// `skip_set`.
    pub async fn ingest(&self, skip_set: &HashSet<u32>) -> Result<RunReport> {
        self.ingest_from(SkipSource::Given(skip_set)).await
    }

    async fn ingest_from(&self, skip: SkipSource<'_>) -> Result<RunReport> {
        let span = info_span!("ingest", folder = %self.config.folder);
        async {
            let result = self.run(skip).await;
            match &result {
                Ok(report) => info!(
                    seen = report.messages_seen,
                    skipped = report.messages_skipped.len(),
                    stored = report.attachments_processed(),
                    unknown = report.unknown_count(),
                    recorded = report.recorded_uids.len(),
                    failed = report.failures.len(),
                    "Ingestion run complete"
                ),
                Err(e) => error!(error = %e, "Ingestion run failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, skip: SkipSource<'_>) -> Result<RunReport> {
        let session = self
            .guard_within("connect", self.config.connect_timeout, self.connector.connect())
            .await?;

        let result = self.run_session(session.as_ref(), skip).await;

        match tokio::time::timeout(self.config.operation_timeout, session.logout()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Logout failed"),
            Err(_) => warn!("Logout timed out"),
        }

        result
    }

    async fn run_session(
        &self,
        session: &dyn MailboxSession,
        skip: SkipSource<'_>,
    ) -> Result<RunReport> {
        let folder = self
            .guard("open folder", session.open_folder(&self.config.folder))
            .await?;

        let from_ledger;
        let skip_set = match skip {
            SkipSource::Given(set) => set,
            SkipSource::Ledger => {
                from_ledger = self
                    .guard("read ledger", self.ledger.processed_uids(&folder))
                    .await?;
                debug!(
                    known = from_ledger.len(),
                    uid_validity = folder.uid_validity,
                    "Loaded processed uids from ledger"
                );
                &from_ledger
            }
        };

        let since = self.config.search_floor(Local::now().date_naive());
        let found = self.guard("search", session.search_since(since)).await?;
        let messages_seen = found.len();
        let unprocessed = filter_unprocessed(found, skip_set);
        info!(
            since = %since,
            seen = messages_seen,
            skipped = unprocessed.skipped.len(),
            new = unprocessed.messages.len(),
            "Search complete"
        );

        let messages = unprocessed.messages;
        let mut report = RunReport {
            messages_seen,
            messages_skipped: unprocessed.skipped,
            ..Default::default()
        };
        let mut failed_uids = BTreeSet::new();

        let plan: Vec<AttachmentPart> = messages.iter().flat_map(attachment_parts).collect();
        let fetched = self
            .fetch_all(session, &plan)
            .instrument(debug_span!("fetch", parts = plan.len()))
            .await;

        let mut attachments = Vec::with_capacity(plan.len());
        let mut failures = Vec::new();
        for (part, outcome) in plan.iter().zip(fetched) {
            match outcome {
                Ok(attachment) => attachments.push(attachment),
                Err(e @ IngestError::Cancelled { .. }) => return Err(e),
                Err(e) => failures.push(AttachmentFailure {
                    uid: part.uid,
                    section: part.section.to_string(),
                    filename: part.filename.clone(),
                    error: e.to_string(),
                }),
            }
        }
        self.settle(BatchStage::Fetch, failures, &mut failed_uids, &mut report)?;
        attachments.retain(|a| !failed_uids.contains(&a.uid));

        if let Some(label) = &self.config.label {
            self.tag_messages(session, &attachments, label).await?;
        }

        self.commit(attachments, &mut failed_uids, &mut report)
            .instrument(debug_span!("commit"))
            .await?;

        let uids: Vec<u32> = messages
            .iter()
            .map(|m| m.uid)
            .filter(|uid| !failed_uids.contains(uid))
            .collect();
        self.check_cancelled("record processed")?;
        if !uids.is_empty() {
            let added = self
                .guard("record processed", self.ledger.record_processed(&folder, &uids))
                .await?;
            debug!(added, "Ledger updated");
        }
        report.recorded_uids = uids;

        Ok(report)
    }

    /// Fetches every planned part with bounded fan-out. Outcomes come back
    /// in plan order.
    async fn fetch_all(
        &self,
        session: &dyn MailboxSession,
        plan: &[AttachmentPart],
    ) -> Vec<Result<ExtractedAttachment>> {
        let mut outcomes: Vec<(usize, Result<ExtractedAttachment>)> =
            stream::iter(plan.iter().enumerate())
                .map(|(index, part)| async move {
                    let outcome = self
                        .guard("fetch part", fetch_attachment(session, part))
                        .await;
                    (index, outcome)
                })
                .buffer_unordered(self.config.max_concurrency.max(1))
                .collect()
                .await;

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Labels each message that had attachments fetched. Failures other
    /// than cancellation are only logged.
    async fn tag_messages(
        &self,
        session: &dyn MailboxSession,
        attachments: &[ExtractedAttachment],
        label: &str,
    ) -> Result<()> {
        let uids: BTreeSet<u32> = attachments.iter().map(|a| a.uid).collect();
        for uid in uids {
            match self.guard("tag message", session.tag_message(uid, label)).await {
                Ok(()) => debug!(uid, label = %label, "Tagged message"),
                Err(e @ IngestError::Cancelled { .. }) => return Err(e),
                Err(e) => warn!(uid, label = %label, error = %e, "Could not tag message"),
            }
        }
        Ok(())
    }

    /// Writes blobs concurrently, then upserts reports one by one in
    /// extraction order so the last attachment for a truck wins.
    async fn commit(
        &self,
        attachments: Vec<ExtractedAttachment>,
        failed_uids: &mut BTreeSet<u32>,
        report: &mut RunReport,
    ) -> Result<()> {
        let staged: Vec<Staged> = attachments
            .into_iter()
            .map(|attachment| Staged {
                classification: classify_attachment(attachment.filename.as_deref()),
                key: new_blob_key(),
                attachment,
            })
            .collect();

        let mut writes: Vec<(usize, Result<PathBuf>)> = stream::iter(staged.iter().enumerate())
            .map(|(index, item)| async move {
                let outcome = self
                    .guard(
                        "write blob",
                        self.blobs.write_blob(&item.key, &item.attachment.data),
                    )
                    .await;
                (index, outcome)
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;
        writes.sort_by_key(|(index, _)| *index);

        let mut failures = Vec::new();
        for (item, (_, outcome)) in staged.iter().zip(writes) {
            match outcome {
                Ok(path) => debug!(uid = item.attachment.uid, path = %path.display(), "Blob written"),
                Err(e @ IngestError::Cancelled { .. }) => return Err(e),
                Err(e) => failures.push(item.failure(&e)),
            }
        }
        self.settle(BatchStage::Commit, failures, failed_uids, report)?;

        for item in &staged {
            if failed_uids.contains(&item.attachment.uid) {
                continue;
            }

            let record = item.to_report();
            match self
                .guard("upsert report", self.reports.upsert_report(&record))
                .await
            {
                Ok(()) => {
                    info!(
                        uid = item.attachment.uid,
                        truck = %record.truck_name,
                        file = %record.file_name,
                        "Stored report"
                    );
                    report.attachments.push(StoredAttachment {
                        uid: item.attachment.uid,
                        section: item.attachment.section.to_string(),
                        filename: item.attachment.filename.clone(),
                        classification: item.classification.clone(),
                        file_name: item.key.clone(),
                    });
                }
                Err(e @ IngestError::Cancelled { .. }) => return Err(e),
                Err(e) => {
                    let failure = item.failure(&e);
                    self.settle(BatchStage::Commit, vec![failure], failed_uids, report)?;
                }
            }
        }

        Ok(())
    }

    /// Applies the failure policy to a stage's failures.
    fn settle(
        &self,
        stage: BatchStage,
        failures: Vec<AttachmentFailure>,
        failed_uids: &mut BTreeSet<u32>,
        report: &mut RunReport,
    ) -> Result<()> {
        if failures.is_empty() {
            return Ok(());
        }

        for failure in &failures {
            warn!(
                uid = failure.uid,
                section = %failure.section,
                error = %failure.error,
                "{} failed",
                stage
            );
        }

        match self.config.failure_policy {
            FailurePolicy::AbortBatch => Err(IngestError::Batch { stage, failures }),
            FailurePolicy::SkipFailedMessages => {
                failed_uids.extend(failures.iter().map(|f| f.uid));
                report.failures.extend(failures);
                Ok(())
            }
        }
    }

    fn check_cancelled(&self, operation: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(IngestError::Cancelled {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    async fn guard<T, E, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        IngestError: From<E>,
    {
        self.guard_within(operation, self.config.operation_timeout, future)
            .await
    }

    /// Bounds `future` by `limit` and the cancellation token.
    async fn guard_within<T, E, F>(&self, operation: &str, limit: Duration, future: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        IngestError: From<E>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(IngestError::Cancelled {
                operation: operation.to_string(),
            }),
            outcome = tokio::time::timeout(limit, future) => match outcome {
                Ok(result) => result.map_err(IngestError::from),
                Err(_) => Err(IngestError::Timeout {
                    operation: operation.to_string(),
                    seconds: limit.as_secs(),
                }),
            },
        }
    }
}
