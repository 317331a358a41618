//! Unified error types for hangsms.
//!
//! Only one class of failure is fatal: the input file being missing or not
//! parseable as a Takeout export. Everything else — a message without a
//! sender, an attachment that cannot be downloaded, a segment with an unknown
//! type tag — is logged and skipped so the run always produces a well-formed
//! document.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized [`Result`] type for hangsms operations.
pub type Result<T> = std::result::Result<T, BackupError>;

/// The error type for all hangsms operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackupError {
    /// An I/O error occurred.
    ///
    /// This typically happens when:
    /// - The input file doesn't exist
    /// - Permission denied
    /// - Disk is full (when writing output)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The input file is not a parseable Takeout export.
    ///
    /// Contains the underlying JSON error and, when known, the file path.
    #[error("Failed to parse Takeout export{}: {source}", path.as_ref().map(|p| format!(" (file: {})", p.display())).unwrap_or_default())]
    Parse {
        /// The underlying parse error
        #[source]
        source: serde_json::Error,
        /// The file path, if available
        path: Option<PathBuf>,
    },

    /// The HTTP client could not be constructed.
    ///
    /// Failures of individual downloads are not errors; they are retried and
    /// then reported as an absent attachment.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// UTF-8 encoding error.
    #[error("UTF-8 encoding error in {context}: {source}")]
    Utf8 {
        /// Description of where the error occurred
        context: String,
        /// The underlying UTF-8 error
        #[source]
        source: std::string::FromUtf8Error,
    },
}
