//! Mailbox error types.

use thiserror::Error;

/// Errors that can occur while talking to the mailbox.
#[derive(Error, Debug)]
pub enum EmailError {
    /// Failed to connect to the IMAP server.
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS/SSL error during connection.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No usable password source was configured.
    #[error("Credentials not found: {0}")]
    CredentialsNotFound(String),

    /// IMAP protocol error (search, malformed response).
    #[error("IMAP protocol error: {0}")]
    ProtocolError(String),

    /// Folder not found.
    #[error("IMAP folder '{0}' not found")]
    FolderNotFound(String),

    /// Retrieving the bytes of a single body part failed.
    #[error("Failed to fetch part {section} of message {uid}: {reason}")]
    FetchFailed {
        uid: u32,
        section: String,
        reason: String,
    },

    /// Part bytes did not decode under their transfer encoding.
    #[error("Failed to decode {encoding} content: {reason}")]
    DecodeFailed { encoding: String, reason: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<async_native_tls::Error> for EmailError {
    fn from(err: async_native_tls::Error) -> Self {
        EmailError::TlsError(err.to_string())
    }
}

/// Result type for mailbox operations.
pub type Result<T> = std::result::Result<T, EmailError>;
