//! Error types for the download transports.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while moving one item's bytes to disk.
///
/// A primary-transport error is expected and recovered via the fallback
/// transport; a fallback error is terminal for that item. Neither is ever
/// surfaced to the pool - the downloader folds them into its outcome value.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS, connection refused, TLS, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed to fetch.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while persisting the bytes.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The fallback download agent could not be spawned or rejected the job.
    #[error("fallback agent {program} failed: {detail}")]
    Agent {
        /// The agent program that was invoked.
        program: String,
        /// Exit status or spawn failure description.
        detail: String,
    },
}

impl TransportError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a fallback-agent error.
    pub fn agent(program: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Agent {
            program: program.into(),
            detail: detail.into(),
        }
    }
}
