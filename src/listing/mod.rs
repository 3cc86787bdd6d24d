//! Item and page data model plus the listing-source seam.
//!
//! A [`ListingSource`] maps one media kind of one owning entity onto the
//! platform's paginated listing API: given an opaque cursor it produces a
//! well-typed [`Page`] or a [`ListingError`]. The platform-specific
//! implementations live in [`crate::graph`]; everything above this seam is
//! platform-agnostic.

mod pager;

pub use pager::CursorPager;

use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a listing source. Fatal to a mirror run: the orchestrator
/// aborts and reports counts collected so far.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The platform request itself failed (network, auth, API error).
    #[error("listing request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response arrived but did not contain the expected shape.
    #[error("malformed listing response: {detail}")]
    Malformed {
        /// What was missing or wrong.
        detail: String,
    },
}

impl ListingError {
    /// Wraps an underlying request error.
    pub fn request(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Request(Box::new(source))
    }

    /// Creates a malformed-response error.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}

/// The kind of media collection being mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Still images.
    Photo,
    /// Regular videos.
    Video,
    /// Short-form clips.
    Reel,
}

impl MediaKind {
    /// File extension used when persisting an item of this kind.
    #[must_use]
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Photo => "jpg",
            Self::Video | Self::Reel => "mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Photo => "photos",
            Self::Video => "videos",
            Self::Reel => "reels",
        };
        f.write_str(name)
    }
}

/// One discovered media item.
///
/// Created when first observed in a page and kept for the remainder of the
/// run. `download_url` may be unknown at discovery time; the downloader
/// fills it in once via a secondary lookup, so repeated downloads of the
/// same in-memory item skip the resolver. The single-assignment cell makes
/// that in-place fill safe from concurrent download tasks without a lock.
#[derive(Debug)]
pub struct MediaItem {
    /// Platform-assigned item id. Unique within a page, but the platform
    /// may repeat an id across pages; that is redundant work, not an error.
    pub id: String,
    /// Cursor that resumes the listing directly after this item.
    pub cursor: String,
    /// Collection kind this item belongs to.
    pub kind: MediaKind,
    /// Thumbnail/preview URL, always present at discovery.
    pub display_url: String,
    /// Caption or description, when the platform provides one.
    pub title: Option<String>,
    download_url: OnceLock<String>,
}

impl MediaItem {
    /// Creates an item whose download URL is not yet known.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        cursor: impl Into<String>,
        kind: MediaKind,
        display_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            cursor: cursor.into(),
            kind,
            display_url: display_url.into(),
            title: None,
            download_url: OnceLock::new(),
        }
    }

    /// Creates an item with a download URL already resolved at discovery.
    #[must_use]
    pub fn with_download_url(
        id: impl Into<String>,
        cursor: impl Into<String>,
        kind: MediaKind,
        display_url: impl Into<String>,
        download_url: impl Into<String>,
    ) -> Self {
        let item = Self::new(id, cursor, kind, display_url);
        let _ = item.download_url.set(download_url.into());
        item
    }

    /// Sets the caption.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Returns the download URL if known.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.download_url.get().map(String::as_str)
    }

    /// Records a resolved download URL. The first write wins; a concurrent
    /// duplicate resolution is silently discarded.
    pub fn set_download_url(&self, url: impl Into<String>) {
        let _ = self.download_url.set(url.into());
    }
}

/// One page of a listing.
#[derive(Debug, Default)]
pub struct Page {
    /// Items in listing order.
    pub items: Vec<MediaItem>,
    /// Cursor for the next page; `None` signals end-of-data.
    pub next_cursor: Option<String>,
}

/// A paginated listing of one media collection.
///
/// `cursor = ""` means start from the beginning. Implementations must not
/// assume any structure in the cursor beyond "replaying it returns the page
/// after the page that produced it".
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetches the page at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError`] if the request fails or the response cannot
    /// be parsed into a [`Page`].
    async fn fetch_page(&self, cursor: &str) -> Result<Page, ListingError>;
}
