use std::path::PathBuf;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-specific errors
#[derive(Debug)]
pub enum LedgerError {
    /// The ledger file could not be read
    Read(PathBuf, std::io::Error),

    /// The ledger file is not a JSON object of strings
    Parse(PathBuf, serde_json::Error),

    /// The ledger could not be serialized or written back
    Write(PathBuf, String),
}

impl LedgerError {
    /// Path of the ledger file involved
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Read(path, _) | Self::Parse(path, _) | Self::Write(path, _) => path,
        }
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(path, err) => write!(f, "Unable to read {}: {}", path.display(), err),
            Self::Parse(path, err) => write!(f, "Unable to parse {}: {}", path.display(), err),
            Self::Write(path, msg) => write!(f, "Unable to write {}: {}", path.display(), msg),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(_, err) => Some(err),
            Self::Parse(_, err) => Some(err),
            Self::Write(..) => None,
        }
    }
}

// Implement conversion from LedgerError to the main Error type
impl From<LedgerError> for crate::Error {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Read(path, e) => crate::Error::LedgerParse {
                path,
                message: e.to_string(),
            },
            LedgerError::Parse(path, e) => crate::Error::LedgerParse {
                path,
                message: e.to_string(),
            },
            LedgerError::Write(path, message) => crate::Error::LedgerWrite { path, message },
        }
    }
}
