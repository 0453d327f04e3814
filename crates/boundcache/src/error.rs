//! Error types for boundcache

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache operations
///
/// A missing key is never an error: lookups report absence with `None`.
#[derive(Debug)]
pub enum Error {
    /// The cache directory did not exist and could not be created
    DirectoryCreationFailed {
        /// Directory that was requested
        path: PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Reading, writing, or deleting a single cache file failed
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// The codec could not encode or decode a value
    Serialization(String),

    /// A directory URL that does not name a local path
    InvalidDirectoryUrl(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DirectoryCreationFailed { path, source } => {
                write!(f, "Failed to create cache directory {}: {}", path.display(), source)
            }
            Error::Io { path, source } => write!(f, "I/O error on {}: {}", path.display(), source),
            Error::Serialization(msg) => write!(f, "Serialization failed: {}", msg),
            Error::InvalidDirectoryUrl(url) => write!(f, "Not a local directory URL: {}", url),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DirectoryCreationFailed { source, .. } | Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
