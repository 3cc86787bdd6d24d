//! Byte-delivery transports.
//!
//! Two alternative mechanisms for the same resource, tried in a fixed
//! order: [`HttpTransport`] fetches the bytes in-process and writes them
//! itself; [`CommandFallback`] hands the URL and destination path to an
//! external download-capable agent when the direct fetch is blocked.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use super::error::TransportError;

/// Connect timeout for media fetches.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for media fetches; media files can be large.
const READ_TIMEOUT_SECS: u64 = 300;

/// Primary transport: fetch a URL's bytes and persist them under a
/// directory with a caller-chosen filename.
#[async_trait]
pub trait ByteTransport: Send + Sync {
    /// Fetches the full body at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on network failure, timeout, or an error
    /// status.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    /// Writes `bytes` to `dir/name`, creating `dir` if needed and
    /// overwriting an existing file. The file handle is closed on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] on any filesystem failure.
    async fn write_file(
        &self,
        dir: &Path,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, TransportError>;
}

/// Fallback transport: delegate the same URL and destination to an
/// external download-capable agent.
#[async_trait]
pub trait FallbackTransport: Send + Sync {
    /// Asks the agent to download `url` to `dest_path`, returning once the
    /// agent signals completion.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the agent cannot be reached or
    /// reports failure.
    async fn enqueue_download(&self, url: &str, dest_path: &Path) -> Result<(), TransportError>;
}

/// Reqwest-backed [`ByteTransport`].
///
/// Created once and reused across items to benefit from connection
/// pooling.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Creates a transport with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Creates a transport around an existing client (shared cookie state
    /// with the platform client, custom timeouts).
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ByteTransport for HttpTransport {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(url)
            } else {
                TransportError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::http_status(url, status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(url)
            } else {
                TransportError::network(url, e)
            }
        })?;

        debug!(url, bytes = bytes.len(), "fetched media body");
        Ok(bytes.to_vec())
    }

    async fn write_file(
        &self,
        dir: &Path,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, TransportError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| TransportError::io(dir, e))?;

        let path = dir.join(name);
        let mut file = File::create(&path)
            .await
            .map_err(|e| TransportError::io(&path, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| TransportError::io(&path, e))?;
        file.flush()
            .await
            .map_err(|e| TransportError::io(&path, e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "wrote media file");
        Ok(path)
    }
}

/// [`FallbackTransport`] that invokes an external downloader program.
///
/// Contract: the program is run as `program <url> <dest-path>`; exit
/// status zero means the download completed. Stdout/stderr are discarded.
#[derive(Debug, Clone)]
pub struct CommandFallback {
    program: String,
}

impl CommandFallback {
    /// Creates a fallback around the given agent program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The configured agent program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl FallbackTransport for CommandFallback {
    #[instrument(level = "debug", skip(self), fields(program = %self.program))]
    async fn enqueue_download(&self, url: &str, dest_path: &Path) -> Result<(), TransportError> {
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::io(parent, e))?;
        }

        let status = tokio::process::Command::new(&self.program)
            .arg(url)
            .arg(dest_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| TransportError::agent(&self.program, e.to_string()))?;

        if !status.success() {
            return Err(TransportError::agent(&self.program, status.to_string()));
        }

        debug!(url, dest = %dest_path.display(), "fallback agent completed download");
        Ok(())
    }
}

/// [`FallbackTransport`] for runs with no agent configured. Always
/// reports failure, so the item's primary-transport error stands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

#[async_trait]
impl FallbackTransport for NoFallback {
    async fn enqueue_download(&self, _url: &str, _dest_path: &Path) -> Result<(), TransportError> {
        Err(TransportError::agent("none", "no fallback agent configured"))
    }
}
