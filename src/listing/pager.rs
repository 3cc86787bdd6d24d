//! Cursor-driven pagination over a [`ListingSource`].

use std::sync::Arc;

use tracing::debug;

use super::{ListingError, ListingSource, Page};

/// Wraps a [`ListingSource`] to produce successive pages while tracking
/// end-of-data.
///
/// The pager adds no retry policy; a source error propagates unchanged and
/// leaves `has_more` untouched, so the caller decides whether the listing
/// is finished.
///
/// A page with zero items ends pagination even when a next cursor is
/// present. Platform cursor contracts are not trustworthy enough to keep
/// paginating on empty pages, and stopping guarantees termination.
pub struct CursorPager {
    source: Arc<dyn ListingSource>,
    has_more: bool,
    pages_fetched: usize,
}

impl CursorPager {
    /// Creates a pager at the start of the listing.
    #[must_use]
    pub fn new(source: Arc<dyn ListingSource>) -> Self {
        Self {
            source,
            has_more: true,
            pages_fetched: 0,
        }
    }

    /// True until a fetched page signals end-of-data.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Number of pages fetched so far.
    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetches the page at `cursor`, updating the end-of-data flag.
    ///
    /// # Errors
    ///
    /// Propagates any [`ListingError`] from the source unchanged.
    pub async fn fetch_page(&mut self, cursor: &str) -> Result<Page, ListingError> {
        let page = self.source.fetch_page(cursor).await?;
        self.pages_fetched += 1;

        if page.items.is_empty() || page.next_cursor.is_none() {
            self.has_more = false;
        }

        debug!(
            page = self.pages_fetched,
            items = page.items.len(),
            has_more = self.has_more,
            "fetched listing page"
        );
        Ok(page)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::listing::{MediaItem, MediaKind};

    /// Replays a fixed script of page results.
    struct ScriptedSource {
        script: Mutex<Vec<Result<Page, ListingError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Page, ListingError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
            })
        }
    }

    #[async_trait]
    impl ListingSource for ScriptedSource {
        async fn fetch_page(&self, _cursor: &str) -> Result<Page, ListingError> {
            self.script.lock().unwrap().remove(0)
        }
    }

    fn page_of(n: usize, next_cursor: Option<&str>) -> Page {
        Page {
            items: (0..n)
                .map(|i| MediaItem::new(format!("id{i}"), format!("c{i}"), MediaKind::Photo, "t"))
                .collect(),
            next_cursor: next_cursor.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_pager_starts_with_more() {
        let pager = CursorPager::new(ScriptedSource::new(vec![]));
        assert!(pager.has_more());
        assert_eq!(pager.pages_fetched(), 0);
    }

    #[tokio::test]
    async fn test_pager_continues_while_cursor_and_items_present() {
        let source = ScriptedSource::new(vec![Ok(page_of(3, Some("c")))]);
        let mut pager = CursorPager::new(source);
        let page = pager.fetch_page("").await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(pager.has_more());
    }

    #[tokio::test]
    async fn test_pager_ends_on_absent_cursor() {
        let source = ScriptedSource::new(vec![Ok(page_of(2, None))]);
        let mut pager = CursorPager::new(source);
        pager.fetch_page("").await.unwrap();
        assert!(!pager.has_more());
    }

    #[tokio::test]
    async fn test_pager_ends_on_empty_page_despite_present_cursor() {
        let source = ScriptedSource::new(vec![Ok(page_of(0, Some("c-still-here")))]);
        let mut pager = CursorPager::new(source);
        let page = pager.fetch_page("").await.unwrap();
        assert!(page.items.is_empty());
        assert!(!pager.has_more());
    }

    #[tokio::test]
    async fn test_pager_propagates_source_error_unchanged() {
        let source = ScriptedSource::new(vec![Err(ListingError::malformed("boom"))]);
        let mut pager = CursorPager::new(source);
        let err = pager.fetch_page("").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        // An error is not end-of-data; the orchestrator decides.
        assert!(pager.has_more());
    }
}
