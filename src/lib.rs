//! Media Mirror Core Library
//!
//! This library mirrors a user-selected media collection (photos, videos,
//! or reels) belonging to an account on a remote content platform to local
//! storage, by paginating the platform's listing API and driving a bounded
//! pool of concurrent per-item downloads.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`pool`] - Generic fixed-width concurrent task executor
//! - [`listing`] - Item/page data model, listing-source seam, cursor pager
//! - [`resolver`] - Secondary lookup for items without a download URL
//! - [`download`] - Per-item download pipeline with transport fallback
//! - [`mirror`] - Orchestrator tying pagination and downloads together
//! - [`auth`] - Session token provider with a single-slot cache
//! - [`graph`] - Platform-specific query construction and response parsing

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod download;
pub mod graph;
pub mod listing;
pub mod mirror;
pub mod pool;
pub mod resolver;

// Re-export commonly used types
pub use auth::{AuthError, AuthProvider, TokenSource};
pub use download::{
    ByteTransport, CommandFallback, DownloadOutcome, FallbackTransport, HttpTransport,
    ItemDownloader, NoFallback, TransportError,
};
pub use listing::{CursorPager, ListingError, ListingSource, MediaItem, MediaKind, Page};
pub use mirror::{Mirror, MirrorError, MirrorProgress, MirrorReport};
pub use pool::{DEFAULT_WIDTH, PoolError, StopHandle, TaskPool};
pub use resolver::{MediaResolver, ResolveError, ResolvedMedia};
