use std::path::Path;

use chrono::{DateTime, NaiveDate};

use crate::config::schema::IngestConfig;
use crate::error::ConfigError;
use crate::secrets::has_secret_source;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<IngestConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<IngestConfig, ConfigError> {
    let config: IngestConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

pub fn validate_config(config: &IngestConfig) -> Result<(), ConfigError> {
    let imap = &config.imap;

    if imap.host.trim().is_empty() {
        return Err(invalid("imap.host must not be empty"));
    }
    if imap.username.trim().is_empty() {
        return Err(invalid("imap.username must not be empty"));
    }
    if imap.port == 0 {
        return Err(invalid("imap.port must be non-zero"));
    }
    if imap.folder.trim().is_empty() {
        return Err(invalid("imap.folder must not be empty"));
    }
    if imap.auth_timeout_secs == 0 {
        return Err(invalid("imap.authTimeoutSecs must be non-zero"));
    }
    if !has_secret_source(
        imap.password_insecure.as_deref(),
        imap.password_file.as_deref(),
        imap.password_env_var.as_deref(),
    ) {
        return Err(invalid(
            "imap needs one of: password, passwordFile, passwordEnvVar",
        ));
    }
    if let Some(since) = &imap.since_date {
        parse_since_date(since)?;
    }

    if config.storage.data_directory.trim().is_empty() {
        return Err(invalid("storage.dataDirectory must not be empty"));
    }

    if config.pipeline.max_concurrency == 0 {
        return Err(invalid("pipeline.maxConcurrency must be at least 1"));
    }
    if config.pipeline.operation_timeout_secs == 0 {
        return Err(invalid("pipeline.operationTimeoutSecs must be non-zero"));
    }

    Ok(())
}

/// Parses a configured search floor, accepting RFC 3339 timestamps or plain
/// `YYYY-MM-DD` dates.
pub fn parse_since_date(date_str: &str) -> Result<NaiveDate, ConfigError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.date_naive());
    }

    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }

    Err(invalid(format!(
        "Invalid sinceDate format: '{}'. Expected ISO 8601 or YYYY-MM-DD",
        date_str
    )))
}
