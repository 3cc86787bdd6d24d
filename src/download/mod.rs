//! Per-item download pipeline.
//!
//! [`ItemDownloader`] moves one item's media to local storage: resolve a
//! missing URL, try the primary HTTP transport, fall back once to an
//! external download agent. All per-item failures are converted to the
//! [`DownloadOutcome`] return value - nothing in this module lets an error
//! escape a pool task.

mod error;
mod item;
mod transport;

pub use error::TransportError;
pub use item::{DownloadOutcome, ItemDownloader};
pub use transport::{ByteTransport, CommandFallback, FallbackTransport, HttpTransport, NoFallback};
