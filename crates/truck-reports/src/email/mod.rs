//! Mailbox access for report ingestion.
//!
//! The pipeline talks to the mailbox through [`MailboxConnector`] and
//! [`MailboxSession`]; [`ImapConnector`] implements them over IMAP with
//! optional TLS.

pub mod client;
pub mod error;
pub mod extractor;
pub mod message;
pub mod session;
pub mod tracker;
pub mod transfer;

pub use client::{ImapClient, ImapConnector};
pub use error::EmailError;
pub use extractor::{attachment_parts, fetch_attachment, AttachmentPart, ExtractedAttachment};
pub use message::{BodyPart, Disposition, MailEnvelope, MailMessage, SectionPath};
pub use session::{FolderInfo, MailboxConnector, MailboxSession};
pub use tracker::{filter_unprocessed, Unprocessed};
pub use transfer::TransferEncoding;
