//! Downloading one item.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::transport::{ByteTransport, FallbackTransport};
use crate::listing::MediaItem;
use crate::resolver::MediaResolver;

/// Result of one download attempt. Failure is reported here, never by
/// error: a pool task bound to [`ItemDownloader::download`] always settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// The item's bytes ended up on disk (via either transport).
    pub downloaded: bool,
    /// The fallback transport delivered them.
    pub used_fallback: bool,
}

impl DownloadOutcome {
    fn failed() -> Self {
        Self::default()
    }

    fn direct() -> Self {
        Self {
            downloaded: true,
            used_fallback: false,
        }
    }

    fn fallback() -> Self {
        Self {
            downloaded: true,
            used_fallback: true,
        }
    }
}

/// Resolves and transfers one item's media to local storage.
///
/// Steps, in order: fill in a missing download URL via the resolver
/// (cached on the item, so a re-download skips the lookup), try the
/// primary transport, then try the fallback transport at most once. Files
/// are named `"<submission index>_<item id>.<ext>"` - the numeric prefix
/// preserves discovery order and keeps concurrent writers on distinct
/// paths even when the platform repeats an id.
pub struct ItemDownloader {
    resolver: Arc<dyn MediaResolver>,
    primary: Arc<dyn ByteTransport>,
    fallback: Arc<dyn FallbackTransport>,
}

impl ItemDownloader {
    /// Creates a downloader over the given collaborators.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        primary: Arc<dyn ByteTransport>,
        fallback: Arc<dyn FallbackTransport>,
    ) -> Self {
        Self {
            resolver,
            primary,
            fallback,
        }
    }

    /// Derives the on-disk filename for `item` at submission position
    /// `index`.
    #[must_use]
    pub fn file_name(item: &MediaItem, index: usize) -> String {
        format!(
            "{index}_{id}.{ext}",
            id = sanitize_component(&item.id),
            ext = item.kind.file_extension()
        )
    }

    /// Downloads `item` into `dest_dir`.
    ///
    /// Never returns an error; all failure modes are folded into the
    /// outcome. The item's download URL is recorded in place when it had
    /// to be resolved.
    #[instrument(level = "debug", skip(self, item, dest_dir), fields(item_id = %item.id, index))]
    pub async fn download(
        &self,
        item: &MediaItem,
        index: usize,
        dest_dir: &Path,
    ) -> DownloadOutcome {
        // Step 1: make sure we have a URL to fetch.
        if item.download_url().is_none() {
            match self.resolver.resolve(&item.id, item.kind).await {
                Ok(resolved) => item.set_download_url(resolved.download_url),
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "could not resolve media URL");
                    return DownloadOutcome::failed();
                }
            }
        }
        let Some(url) = item.download_url() else {
            // Unreachable in practice: a successful resolve just set it.
            return DownloadOutcome::failed();
        };

        let name = Self::file_name(item, index);

        // Step 2: primary transport - fetch the bytes ourselves.
        let primary_err = match self.fetch_and_write(url, dest_dir, &name).await {
            Ok(()) => {
                debug!(item_id = %item.id, file = %name, "downloaded via primary transport");
                return DownloadOutcome::direct();
            }
            Err(e) => e,
        };

        // Step 3: fallback transport, at most once.
        warn!(
            item_id = %item.id,
            error = %primary_err,
            "primary transport failed; trying fallback"
        );
        match self
            .fallback
            .enqueue_download(url, &dest_dir.join(&name))
            .await
        {
            Ok(()) => {
                debug!(item_id = %item.id, file = %name, "downloaded via fallback transport");
                DownloadOutcome::fallback()
            }
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "fallback transport failed");
                DownloadOutcome::failed()
            }
        }
    }

    async fn fetch_and_write(
        &self,
        url: &str,
        dest_dir: &Path,
        name: &str,
    ) -> Result<(), super::TransportError> {
        let bytes = self.primary.fetch_bytes(url).await?;
        self.primary.write_file(dest_dir, name, &bytes).await?;
        Ok(())
    }
}

/// Strips filesystem-hostile characters out of an id before it becomes
/// part of a filename. Platform ids are numeric in practice; this guards
/// against the ones that are not.
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::download::TransportError;
    use crate::listing::MediaKind;
    use crate::resolver::{ResolveError, ResolvedMedia};

    struct StubResolver {
        url: Option<String>,
        calls: AtomicUsize,
    }

    impl StubResolver {
        fn returning(url: &str) -> Arc<Self> {
            Arc::new(Self {
                url: Some(url.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                url: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MediaResolver for StubResolver {
        async fn resolve(
            &self,
            item_id: &str,
            _kind: MediaKind,
        ) -> Result<ResolvedMedia, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.url {
                Some(url) => Ok(ResolvedMedia {
                    download_url: url.clone(),
                    width: None,
                    height: None,
                }),
                None => Err(ResolveError::no_url(item_id)),
            }
        }
    }

    struct StubPrimary {
        fail_fetch: bool,
        fetched: Mutex<Vec<String>>,
    }

    impl StubPrimary {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                fail_fetch: false,
                fetched: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail_fetch: true,
                fetched: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ByteTransport for StubPrimary {
        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
            self.fetched.lock().unwrap().push(url.to_string());
            if self.fail_fetch {
                Err(TransportError::http_status(url, 403))
            } else {
                Ok(b"media-bytes".to_vec())
            }
        }

        async fn write_file(
            &self,
            dir: &Path,
            name: &str,
            bytes: &[u8],
        ) -> Result<std::path::PathBuf, TransportError> {
            std::fs::create_dir_all(dir).map_err(|e| TransportError::io(dir, e))?;
            let path = dir.join(name);
            std::fs::write(&path, bytes).map_err(|e| TransportError::io(&path, e))?;
            Ok(path)
        }
    }

    struct StubFallback {
        succeed: bool,
        calls: AtomicUsize,
    }

    impl StubFallback {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                succeed: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                succeed: false,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl FallbackTransport for StubFallback {
        async fn enqueue_download(
            &self,
            _url: &str,
            _dest_path: &Path,
        ) -> Result<(), TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(())
            } else {
                Err(TransportError::agent("stub", "rejected"))
            }
        }
    }

    fn downloader(
        resolver: Arc<StubResolver>,
        primary: Arc<StubPrimary>,
        fallback: Arc<StubFallback>,
    ) -> ItemDownloader {
        ItemDownloader::new(resolver, primary, fallback)
    }

    #[test]
    fn test_file_name_has_index_prefix_and_kind_extension() {
        let photo = MediaItem::new("42", "", MediaKind::Photo, "t");
        assert_eq!(ItemDownloader::file_name(&photo, 7), "7_42.jpg");

        let reel = MediaItem::new("a/b:c", "", MediaKind::Reel, "t");
        assert_eq!(ItemDownloader::file_name(&reel, 0), "0_a_b_c.mp4");
    }

    #[tokio::test]
    async fn test_known_url_skips_resolver() {
        let tmp = TempDir::new().unwrap();
        let resolver = StubResolver::returning("https://cdn/should-not-be-used");
        let dl = downloader(Arc::clone(&resolver), StubPrimary::ok(), StubFallback::ok());

        let item =
            MediaItem::with_download_url("1", "", MediaKind::Photo, "t", "https://cdn/known.jpg");
        let outcome = dl.download(&item, 0, tmp.path()).await;

        assert!(outcome.downloaded);
        assert!(!outcome.used_fallback);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert!(tmp.path().join("0_1.jpg").exists());
    }

    #[tokio::test]
    async fn test_resolver_failure_skips_transports() {
        let tmp = TempDir::new().unwrap();
        let primary = StubPrimary::ok();
        let fallback = StubFallback::ok();
        let dl = downloader(
            StubResolver::failing(),
            Arc::clone(&primary),
            Arc::clone(&fallback),
        );

        let item = MediaItem::new("1", "", MediaKind::Video, "t");
        let outcome = dl.download(&item, 0, tmp.path()).await;

        assert_eq!(outcome, DownloadOutcome::default());
        assert!(primary.fetched.lock().unwrap().is_empty());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolved_url_is_cached_on_item() {
        let tmp = TempDir::new().unwrap();
        let resolver = StubResolver::returning("https://cdn/resolved.mp4");
        let dl = downloader(Arc::clone(&resolver), StubPrimary::ok(), StubFallback::ok());

        let item = MediaItem::new("9", "", MediaKind::Video, "t");
        dl.download(&item, 0, tmp.path()).await;
        assert_eq!(item.download_url(), Some("https://cdn/resolved.mp4"));

        // Second download of the same in-memory item: no second lookup.
        dl.download(&item, 1, tmp.path()).await;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_once() {
        let tmp = TempDir::new().unwrap();
        let fallback = StubFallback::ok();
        let dl = downloader(
            StubResolver::returning("https://cdn/x.mp4"),
            StubPrimary::failing(),
            Arc::clone(&fallback),
        );

        let item = MediaItem::new("5", "", MediaKind::Reel, "t");
        let outcome = dl.download(&item, 3, tmp.path()).await;

        assert!(outcome.downloaded);
        assert!(outcome.used_fallback);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_transports_failing_counts_as_failed() {
        let tmp = TempDir::new().unwrap();
        let fallback = StubFallback::failing();
        let dl = downloader(
            StubResolver::returning("https://cdn/x.jpg"),
            StubPrimary::failing(),
            Arc::clone(&fallback),
        );

        let item = MediaItem::new("5", "", MediaKind::Photo, "t");
        let outcome = dl.download(&item, 0, tmp.path()).await;

        assert!(!outcome.downloaded);
        assert!(!outcome.used_fallback);
        // No second fallback attempt exists.
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }
}
