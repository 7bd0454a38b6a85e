//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed. Connecting, logging in and opening the
    /// mailbox all end up here.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailpager_imap::Error),

    /// The pagination cursor could not be decoded.
    #[error("Invalid cursor: {0}")]
    CursorDecode(String),

    /// The request itself is malformed, e.g. a zero page size.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if the error was caused by client input rather than
    /// by the server or the environment.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::CursorDecode(_) | Self::InvalidRequest(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
