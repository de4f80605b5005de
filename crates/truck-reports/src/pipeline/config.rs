use std::time::Duration;

use chrono::NaiveDate;

use crate::config::{parse_since_date, FailurePolicy, IngestConfig};
use crate::error::ConfigError;

/// Run settings for [`IngestPipeline`](super::IngestPipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub folder: String,
    /// Label for messages whose attachments were fetched. `None` disables
    /// tagging.
    pub label: Option<String>,
    /// Search floor. `None` means the start of the current local day.
    pub since: Option<NaiveDate>,
    pub max_concurrency: usize,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl PipelineConfig {
    pub fn from_config(config: &IngestConfig) -> Result<Self, ConfigError> {
        let since = config
            .imap
            .since_date
            .as_deref()
            .map(parse_since_date)
            .transpose()?;

        Ok(Self {
            folder: config.imap.folder.clone(),
            label: config.imap.label.clone(),
            since,
            max_concurrency: config.pipeline.max_concurrency.max(1),
            connect_timeout: config.imap.auth_timeout(),
            operation_timeout: Duration::from_secs(config.pipeline.operation_timeout_secs),
            failure_policy: config.pipeline.failure_policy,
        })
    }

    /// The SINCE date for a run started on `today`.
    pub fn search_floor(&self, today: NaiveDate) -> NaiveDate {
        self.since.unwrap_or(today)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            folder: "INBOX".to_string(),
            label: Some("downloaded".to_string()),
            since: None,
            max_concurrency: 8,
            connect_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(60),
            failure_policy: FailurePolicy::AbortBatch,
        }
    }
}
