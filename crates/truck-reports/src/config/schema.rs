use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    pub imap: ImapConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Mailbox connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImapConfig {
    /// IMAP server hostname.
    pub host: String,

    /// IMAP server port (default: 993 for IMAPS).
    #[serde(default = "default_imap_port")]
    pub port: u16,

    /// Whether to wrap the connection in TLS.
    #[serde(default = "default_true")]
    pub use_tls: bool,

    /// Login name, typically the mailbox address.
    pub username: String,

    /// Inline password. Prefer `passwordFile` or `passwordEnvVar`.
    #[serde(default, rename = "password", skip_serializing_if = "Option::is_none")]
    pub password_insecure: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env_var: Option<String>,

    /// Folder to ingest from (default: "INBOX").
    #[serde(default = "default_inbox")]
    pub folder: String,

    /// Upper bound for TCP connect, TLS handshake and login together.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    /// Label applied to messages once their attachments are downloaded.
    /// `null` disables tagging.
    #[serde(default = "default_label")]
    pub label: Option<String>,

    /// Overrides the "since start of today" search floor (ISO 8601 or
    /// YYYY-MM-DD). Meant for one-off backfills.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_date: Option<String>,
}

impl ImapConfig {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

fn default_imap_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_inbox() -> String {
    "INBOX".to_string()
}

fn default_auth_timeout() -> u64 {
    10
}

fn default_label() -> Option<String> {
    Some("downloaded".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_directory).join("truck-reports.db")
    }

    pub fn files_directory(&self) -> PathBuf {
        PathBuf::from(&self.data_directory).join("files")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
        }
    }
}

fn default_data_directory() -> String {
    "data".to_string()
}

/// What a run does when individual attachments fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Any failure aborts the run before the ledger is touched.
    #[default]
    AbortBatch,
    /// Messages with a failed attachment are left out of the run and retried
    /// next time; everything else commits.
    SkipFailedMessages,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSettings {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            operation_timeout_secs: default_operation_timeout(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_max_concurrency() -> usize {
    8
}

fn default_operation_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
