//! Test harness for isolated pipeline runs.
//!
//! `TestHarness` owns a temp directory holding a real SQLite database and
//! files directory, and a `FakeMailbox` standing in for the IMAP server.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use truck_reports::config::FailurePolicy;
use truck_reports::db::{mail_repo, report_repo};
use truck_reports::email::{
    EmailError, FolderInfo, MailMessage, MailboxConnector, MailboxSession, SectionPath,
};
use truck_reports::{
    Database, FileStorage, IngestPipeline, PipelineConfig, Report, ReportStore, StorageError,
};

use super::builders::MessageBuilder;

type EmailResult<T> = Result<T, EmailError>;

const INBOX: &str = "INBOX";

struct FakeFolder {
    uid_validity: u32,
    messages: Vec<MailMessage>,
    parts: HashMap<(u32, String), Vec<u8>>,
}

impl FakeFolder {
    fn new(uid_validity: u32) -> Self {
        Self {
            uid_validity,
            messages: Vec::new(),
            parts: HashMap::new(),
        }
    }
}

struct MailboxState {
    folders: Mutex<HashMap<String, FakeFolder>>,
    failing_parts: Mutex<HashSet<(u32, String)>>,
    tagged: Mutex<Vec<(u32, String)>>,
    searches: Mutex<Vec<NaiveDate>>,
    fetch_delay: Mutex<Option<Duration>>,
    fail_tagging: AtomicBool,
    part_fetches: AtomicUsize,
    connects: AtomicUsize,
    logouts: AtomicUsize,
}

impl Default for MailboxState {
    fn default() -> Self {
        Self {
            folders: Mutex::new(HashMap::from([(INBOX.to_string(), FakeFolder::new(1))])),
            failing_parts: Mutex::default(),
            tagged: Mutex::default(),
            searches: Mutex::default(),
            fetch_delay: Mutex::default(),
            fail_tagging: AtomicBool::default(),
            part_fetches: AtomicUsize::default(),
            connects: AtomicUsize::default(),
            logouts: AtomicUsize::default(),
        }
    }
}

/// Scripted in-memory mailbox. Starts with an empty INBOX at UIDVALIDITY 1.
/// Clones share state, so a test can keep a handle for assertions after
/// giving one to the pipeline.
#[derive(Clone, Default)]
pub struct FakeMailbox {
    state: Arc<MailboxState>,
}

impl FakeMailbox {
    pub fn add(&self, builder: MessageBuilder) {
        self.add_to(INBOX, builder);
    }

    /// Adds a message to `folder`, creating it at UIDVALIDITY 1 if needed.
    pub fn add_to(&self, folder: &str, builder: MessageBuilder) {
        let built = builder.build();
        let uid = built.message.uid;
        let mut folders = self.state.folders.lock().unwrap();
        let target = folders
            .entry(folder.to_string())
            .or_insert_with(|| FakeFolder::new(1));
        for (section, bytes) in built.parts {
            target.parts.insert((uid, section), bytes);
        }
        target.messages.push(built.message);
    }

    /// Replaces `folder` with an empty one at a new UIDVALIDITY, as a
    /// server does when a mailbox is deleted and created again.
    pub fn recreate(&self, folder: &str, uid_validity: u32) {
        self.state
            .folders
            .lock()
            .unwrap()
            .insert(folder.to_string(), FakeFolder::new(uid_validity));
    }

    /// Makes fetching `section` of `uid` fail until [`heal_part`] is called.
    pub fn fail_part(&self, uid: u32, section: &str) {
        self.state
            .failing_parts
            .lock()
            .unwrap()
            .insert((uid, section.to_string()));
    }

    pub fn heal_part(&self, uid: u32, section: &str) {
        self.state
            .failing_parts
            .lock()
            .unwrap()
            .remove(&(uid, section.to_string()));
    }

    pub fn fail_tagging(&self) {
        self.state.fail_tagging.store(true, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.state.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn tagged(&self) -> Vec<(u32, String)> {
        self.state.tagged.lock().unwrap().clone()
    }

    /// SINCE dates of every search, in order.
    pub fn searches(&self) -> Vec<NaiveDate> {
        self.state.searches.lock().unwrap().clone()
    }

    pub fn part_fetches(&self) -> usize {
        self.state.part_fetches.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.state.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailboxConnector for FakeMailbox {
    async fn connect(&self) -> EmailResult<Box<dyn MailboxSession>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            selected: Mutex::new(None),
        }))
    }
}

struct FakeSession {
    state: Arc<MailboxState>,
    selected: Mutex<Option<String>>,
}

impl FakeSession {
    fn selected(&self) -> EmailResult<String> {
        self.selected
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| EmailError::ProtocolError("no folder selected".to_string()))
    }
}

#[async_trait]
impl MailboxSession for FakeSession {
    async fn open_folder(&self, folder: &str) -> EmailResult<FolderInfo> {
        let folders = self.state.folders.lock().unwrap();
        let found = folders
            .get(folder)
            .ok_or_else(|| EmailError::FolderNotFound(folder.to_string()))?;
        *self.selected.lock().unwrap() = Some(folder.to_string());
        Ok(FolderInfo {
            name: folder.to_string(),
            uid_validity: found.uid_validity,
        })
    }

    async fn search_since(&self, since: NaiveDate) -> EmailResult<Vec<MailMessage>> {
        let selected = self.selected()?;
        self.state.searches.lock().unwrap().push(since);
        let folders = self.state.folders.lock().unwrap();
        let mut messages = folders
            .get(&selected)
            .map(|f| f.messages.clone())
            .unwrap_or_default();
        messages.sort_by_key(|m| m.uid);
        Ok(messages)
    }

    async fn fetch_part(&self, uid: u32, section: &SectionPath) -> EmailResult<Vec<u8>> {
        self.state.part_fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let key = (uid, section.to_string());
        let fetch_failed = |reason: &str| EmailError::FetchFailed {
            uid,
            section: section.to_string(),
            reason: reason.to_string(),
        };
        if self.state.failing_parts.lock().unwrap().contains(&key) {
            return Err(fetch_failed("connection reset by peer"));
        }
        let selected = self.selected()?;
        self.state
            .folders
            .lock()
            .unwrap()
            .get(&selected)
            .and_then(|f| f.parts.get(&key).cloned())
            .ok_or_else(|| fetch_failed("no such part"))
    }

    async fn tag_message(&self, uid: u32, label: &str) -> EmailResult<()> {
        if self.state.fail_tagging.load(Ordering::SeqCst) {
            return Err(EmailError::ProtocolError("X-GM-LABELS not supported".to_string()));
        }
        self.state
            .tagged
            .lock()
            .unwrap()
            .push((uid, label.to_string()));
        Ok(())
    }

    async fn logout(&self) -> EmailResult<()> {
        self.state.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Report store that refuses one truck name and delegates the rest.
pub struct FailingReports {
    inner: Database,
    fail_for: String,
}

impl FailingReports {
    pub fn new(inner: Database, fail_for: &str) -> Self {
        Self {
            inner,
            fail_for: fail_for.to_string(),
        }
    }
}

#[async_trait]
impl ReportStore for FailingReports {
    async fn upsert_report(&self, report: &Report) -> Result<(), StorageError> {
        if report.truck_name == self.fail_for {
            return Err(StorageError::WriteFile {
                path: PathBuf::from("reports"),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.upsert_report(report).await
    }
}

/// Isolated environment for one pipeline test.
pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub mailbox: FakeMailbox,
    pub files_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("truck-reports.db"))
            .expect("Failed to open test database");
        let files_dir = temp_dir.path().join("files");

        Self {
            temp_dir,
            db,
            mailbox: FakeMailbox::default(),
            files_dir,
        }
    }

    pub fn config(policy: FailurePolicy) -> PipelineConfig {
        PipelineConfig {
            since: NaiveDate::from_ymd_opt(2026, 1, 12),
            operation_timeout: Duration::from_secs(5),
            max_concurrency: 4,
            failure_policy: policy,
            ..PipelineConfig::default()
        }
    }

    pub fn pipeline(&self) -> IngestPipeline {
        self.pipeline_with(Self::config(FailurePolicy::AbortBatch))
    }

    pub fn pipeline_with(&self, config: PipelineConfig) -> IngestPipeline {
        self.pipeline_with_reports(Arc::new(self.db.clone()), config)
    }

    pub fn pipeline_with_reports(
        &self,
        reports: Arc<dyn ReportStore>,
        config: PipelineConfig,
    ) -> IngestPipeline {
        IngestPipeline::new(
            Arc::new(self.mailbox.clone()),
            reports,
            Arc::new(self.db.clone()),
            Arc::new(FileStorage::new(&self.files_dir)),
            config,
        )
    }

    pub fn reports(&self) -> Vec<Report> {
        report_repo::list(&self.db).unwrap()
    }

    pub fn report(&self, truck_name: &str) -> Option<Report> {
        report_repo::find(&self.db, truck_name).unwrap()
    }

    /// Ledger entries for INBOX at UIDVALIDITY 1.
    pub fn ledger(&self) -> HashSet<u32> {
        self.ledger_for(INBOX, 1)
    }

    pub fn ledger_for(&self, folder: &str, uid_validity: u32) -> HashSet<u32> {
        let folder = FolderInfo {
            name: folder.to_string(),
            uid_validity,
        };
        mail_repo::list_uids(&self.db, &folder).unwrap()
    }

    pub fn blob(&self, report: &Report) -> Vec<u8> {
        std::fs::read(self.files_dir.join(&report.file_name)).unwrap()
    }

    pub fn blob_count(&self) -> usize {
        match std::fs::read_dir(&self.files_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}
