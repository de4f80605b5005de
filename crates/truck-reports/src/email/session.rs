//! Narrow mailbox capability the ingestion pipeline depends on.
//!
//! [`ImapConnector`](super::client::ImapConnector) is the production
//! implementation; tests script their own.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::Result;
use super::message::{MailMessage, SectionPath};

/// The selected folder and its UIDVALIDITY. UIDs are only unique within
/// this pair, so it scopes every ledger lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderInfo {
    pub name: String,
    /// 0 when the server did not report one.
    pub uid_validity: u32,
}

/// Opens authenticated mailbox sessions.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn MailboxSession>>;
}

/// An authenticated mailbox connection.
///
/// Methods take `&self` so that part fetches can be issued from concurrent
/// tasks; implementations serialize protocol commands internally as needed.
#[async_trait]
pub trait MailboxSession: Send + Sync {
    /// Opens `folder` for reading and tagging.
    async fn open_folder(&self, folder: &str) -> Result<FolderInfo>;

    /// Returns every message received on or after `since`, with envelope and
    /// body structure but no part bytes.
    async fn search_since(&self, since: NaiveDate) -> Result<Vec<MailMessage>>;

    /// Returns the still transfer-encoded bytes of one body part.
    async fn fetch_part(&self, uid: u32, section: &SectionPath) -> Result<Vec<u8>>;

    /// Attaches an advisory label to a message.
    async fn tag_message(&self, uid: u32, label: &str) -> Result<()>;

    async fn logout(&self) -> Result<()>;
}
