//! Error types for the filecache crate

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for localization cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Configuration or validation error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(filecache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// I/O error during cache operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(filecache::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "copy", "mkdir", "unzip")
        operation: String,
    },

    /// The remote artifact no longer matches the timestamp the job recorded
    /// at submission. Fatal to the job; never retried.
    #[error("Remote file {uri} has changed since the job was submitted")]
    #[diagnostic(code(filecache::stale_artifact))]
    StaleArtifact {
        /// The artifact whose remote copy drifted
        uri: String,
    },

    /// A stale entry cannot be replaced while other tasks still hold it
    #[error("Cache {} is in use and cannot be refreshed", path.display())]
    #[diagnostic(
        code(filecache::in_use),
        help("Retry after the holding tasks release the entry")
    )]
    CacheInUse {
        /// Local directory of the held entry
        path: Box<Path>,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a stale-artifact error
    #[must_use]
    pub fn stale_artifact(uri: impl ToString) -> Self {
        Self::StaleArtifact {
            uri: uri.to_string(),
        }
    }

    /// Create a cache-in-use error
    #[must_use]
    pub fn cache_in_use(path: impl AsRef<Path>) -> Self {
        Self::CacheInUse {
            path: path.as_ref().into(),
        }
    }
}

/// Result type for localization cache operations
pub type Result<T> = std::result::Result<T, Error>;
