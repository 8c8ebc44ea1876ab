use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the image-uploader library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid or incomplete configuration. Fatal for the whole run.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The metadata tool could not read the image
    #[error("Unable to read metadata from {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Stripping keywords from the local file failed
    #[error("Unable to remove keywords from {path}: {message}")]
    KeywordStrip { path: PathBuf, message: String },

    /// The remote service rejected or failed the upload
    #[error("Upload failed: {0}")]
    Upload(String),

    /// A remote call other than the upload failed
    #[error("Remote call {method} failed: {message}")]
    Remote { method: String, message: String },

    /// The ledger file exists but is not a JSON object of strings
    #[error("Unable to parse upload ledger {path}: {message}")]
    LedgerParse { path: PathBuf, message: String },

    /// The ledger could not be written back to disk
    #[error("Unable to write upload ledger {path}: {message}")]
    LedgerWrite { path: PathBuf, message: String },

    /// An external operation took longer than allowed
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },
}
