//! Secondary lookup for items discovered without a downloadable URL.
//!
//! Listing pages often carry only a thumbnail for an item; the actual
//! media URL then requires one extra per-item query keyed by the item id.
//! [`MediaResolver`] is that seam. The platform implementation lives in
//! [`crate::graph`]; tests substitute scripted resolvers.

use async_trait::async_trait;
use thiserror::Error;

use crate::listing::MediaKind;

/// Errors from a resolution attempt. Counted as an item failure; never
/// fatal to the run.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The lookup request failed (network, auth, API error).
    #[error("resolution request failed for item {item_id}: {source}")]
    Request {
        /// The item whose lookup failed.
        item_id: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The lookup succeeded but yielded no usable media URL.
    #[error("no downloadable URL for item {item_id}")]
    NoUrl {
        /// The item that had no usable URL.
        item_id: String,
    },
}

impl ResolveError {
    /// Wraps an underlying request error.
    pub fn request(
        item_id: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Request {
            item_id: item_id.into(),
            source: Box::new(source),
        }
    }

    /// Creates a no-URL error.
    pub fn no_url(item_id: impl Into<String>) -> Self {
        Self::NoUrl {
            item_id: item_id.into(),
        }
    }
}

/// A resolved media URL plus whatever metadata the lookup surfaced.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    /// The downloadable media URL.
    pub download_url: String,
    /// Pixel width, when reported.
    pub width: Option<u32>,
    /// Pixel height, when reported.
    pub height: Option<u32>,
}

/// Per-item media URL lookup.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolves the downloadable URL for `item_id` of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the lookup fails or produces no URL.
    async fn resolve(&self, item_id: &str, kind: MediaKind) -> Result<ResolvedMedia, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_no_url_display() {
        let err = ResolveError::no_url("12345");
        let msg = err.to_string();
        assert!(msg.contains("12345"), "expected item id in: {msg}");
        assert!(msg.contains("no downloadable URL"));
    }
}
