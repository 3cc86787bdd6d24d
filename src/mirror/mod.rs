//! The mirror run orchestrator.
//!
//! [`Mirror`] drives one complete mirror of a media collection: it drains
//! pages from a [`CursorPager`], appends the items to an append-only list,
//! submits the not-yet-submitted suffix to a [`TaskPool`] bound to an
//! [`ItemDownloader`], and folds settled outcomes into run counters.
//!
//! The submission watermark advances when a batch is handed to the pool,
//! not when it completes - it exists to keep the next loop iteration from
//! re-submitting items, so it must move before settlement. The item list
//! and the watermark are touched only by the run loop itself, which awaits
//! each batch before reading them again, so neither needs a lock.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::download::ItemDownloader;
use crate::listing::{CursorPager, ListingError, ListingSource, MediaItem};
use crate::pool::{StopHandle, TaskPool};

/// Error type for a mirror run.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The listing source failed. The partial mirror on disk is kept; the
    /// report carries the counts collected before the failure.
    #[error("listing failed after {} downloaded, {} failed: {source}", partial.downloaded, partial.failed)]
    Listing {
        /// The underlying listing failure.
        #[source]
        source: ListingError,
        /// Counters collected before the run aborted.
        partial: MirrorReport,
    },
}

/// Final (or partial, on abort) counts for a mirror run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    /// Items whose bytes reached disk via either transport.
    pub downloaded: usize,
    /// Items that failed resolution or both transports.
    pub failed: usize,
    /// Items delivered by the fallback transport (subset of `downloaded`).
    pub used_fallback: usize,
    /// Items discovered across all fetched pages.
    pub discovered: usize,
}

/// Progress snapshot passed to the progress callback after every settled
/// item.
#[derive(Debug, Clone, Copy)]
pub struct MirrorProgress {
    /// Successfully downloaded so far.
    pub downloaded_so_far: usize,
    /// Failed so far.
    pub failed_so_far: usize,
}

/// Run counters, updated from concurrently settling download tasks.
#[derive(Debug, Default)]
struct MirrorCounters {
    downloaded: AtomicUsize,
    failed: AtomicUsize,
    used_fallback: AtomicUsize,
}

impl MirrorCounters {
    fn record(&self, outcome: crate::download::DownloadOutcome) {
        if outcome.downloaded {
            self.downloaded.fetch_add(1, Ordering::SeqCst);
            if outcome.used_fallback {
                self.used_fallback.fetch_add(1, Ordering::SeqCst);
            }
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn progress(&self) -> MirrorProgress {
        MirrorProgress {
            downloaded_so_far: self.downloaded.load(Ordering::SeqCst),
            failed_so_far: self.failed.load(Ordering::SeqCst),
        }
    }

    fn report(&self, discovered: usize) -> MirrorReport {
        MirrorReport {
            downloaded: self.downloaded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            used_fallback: self.used_fallback.load(Ordering::SeqCst),
            discovered,
        }
    }
}

/// Callback invoked after every settled item.
pub type ProgressFn = Arc<dyn Fn(MirrorProgress) + Send + Sync>;

/// Orchestrates one mirror run to local storage.
pub struct Mirror {
    source: Arc<dyn ListingSource>,
    downloader: Arc<ItemDownloader>,
    pool: TaskPool,
    dest_dir: PathBuf,
    progress: Option<ProgressFn>,
}

impl Mirror {
    /// Creates a mirror over the given collaborators.
    #[must_use]
    pub fn new(
        source: Arc<dyn ListingSource>,
        downloader: Arc<ItemDownloader>,
        pool: TaskPool,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            downloader,
            pool,
            dest_dir: dest_dir.into(),
            progress: None,
        }
    }

    /// Installs a callback fired after every settled item.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns a handle that stops the run cooperatively: no further task
    /// starts, and the paging loop ends after the in-flight batch settles.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.pool.stop_handle()
    }

    /// Runs the mirror to completion.
    ///
    /// Pagination is strictly sequential; each page's unsubmitted suffix
    /// is submitted as one pool batch and awaited before the next page is
    /// requested. Per-item failures never abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Listing`] if the listing source fails; the
    /// report inside carries the counts collected so far.
    #[instrument(skip(self), fields(dest_dir = %self.dest_dir.display()))]
    pub async fn run(&self) -> Result<MirrorReport, MirrorError> {
        let counters = Arc::new(MirrorCounters::default());
        let mut all_items: Vec<Arc<MediaItem>> = Vec::new();
        let mut submitted = 0usize;
        let mut pager = CursorPager::new(Arc::clone(&self.source));
        let stop = self.pool.stop_handle();

        info!("starting mirror run");

        loop {
            if pager.has_more() && !stop.is_stopped() {
                let cursor = all_items
                    .last()
                    .map_or_else(String::new, |item| item.cursor.clone());
                let page = match pager.fetch_page(&cursor).await {
                    Ok(page) => page,
                    Err(source) => {
                        warn!(error = %source, "listing failed; keeping partial mirror");
                        return Err(MirrorError::Listing {
                            source,
                            partial: counters.report(all_items.len()),
                        });
                    }
                };
                all_items.extend(page.items.into_iter().map(Arc::new));
            }

            // Unsubmitted suffix of the cumulative item list.
            let suffix: Vec<Arc<MediaItem>> = all_items[submitted..].to_vec();
            if suffix.is_empty() {
                if !pager.has_more() || stop.is_stopped() {
                    break;
                }
                continue;
            }

            let base = submitted;
            let tasks: Vec<_> = suffix
                .into_iter()
                .enumerate()
                .map(|(offset, item)| {
                    let downloader = Arc::clone(&self.downloader);
                    let counters = Arc::clone(&counters);
                    let progress = self.progress.clone();
                    let dest_dir = self.dest_dir.clone();
                    move || async move {
                        let outcome = downloader.download(&item, base + offset, &dest_dir).await;
                        counters.record(outcome);
                        if let Some(callback) = progress {
                            callback(counters.progress());
                        }
                        outcome
                    }
                })
                .collect();

            // Watermark moves at submission time, before settlement.
            submitted += tasks.len();
            debug!(batch = tasks.len(), submitted, "submitting download batch");

            let settled = self.pool.run_all(tasks).await;
            debug!(settled = settled.len(), "batch settled");

            if stop.is_stopped() {
                info!("mirror run stopped by request");
                break;
            }
            if !pager.has_more() && submitted == all_items.len() {
                break;
            }
        }

        let report = counters.report(all_items.len());
        info!(
            downloaded = report.downloaded,
            failed = report.failed,
            used_fallback = report.used_fallback,
            discovered = report.discovered,
            "mirror run complete"
        );
        Ok(report)
    }
}
