pub mod classifier;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod secrets;
pub mod storage;
pub mod store;

pub use classifier::{classify_attachment, classify_filename, Classification, UnknownReason};
pub use config::{load_config, IngestConfig};
pub use db::{Database, DatabaseError, Report};
pub use email::{EmailError, ImapConnector, MailboxConnector, MailboxSession};
pub use error::{AttachmentFailure, BatchStage, ConfigError, IngestError, Result, StorageError};
pub use pipeline::{IngestPipeline, PipelineConfig, RunReport};
pub use secrets::{resolve_secret, SecretError};
pub use storage::FileStorage;
pub use store::{BlobStore, MailLedger, ReportStore};
