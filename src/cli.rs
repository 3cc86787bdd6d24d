//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use mirror_core::{DEFAULT_WIDTH, MediaKind};

/// Which collection of the target account to mirror.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaArg {
    /// Uploaded photos
    Photos,
    /// Uploaded videos
    Videos,
    /// Short-form reels
    Reels,
}

impl From<MediaArg> for MediaKind {
    fn from(arg: MediaArg) -> Self {
        match arg {
            MediaArg::Photos => MediaKind::Photo,
            MediaArg::Videos => MediaKind::Video,
            MediaArg::Reels => MediaKind::Reel,
        }
    }
}

/// Mirror an account's media collections to local storage.
///
/// Media Mirror pages through the photos, videos, or reels of a user,
/// page, or group and downloads every item into a destination directory,
/// a bounded number of items at a time.
#[derive(Parser, Debug)]
#[command(name = "media-mirror")]
#[command(author, version, about)]
pub struct Args {
    /// Id or username of the account, page, or group to mirror
    pub entity: String,

    /// Collection to mirror
    #[arg(value_enum, default_value_t = MediaArg::Photos)]
    pub media: MediaArg,

    /// Destination directory for downloaded files
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Netscape-format cookies file holding the platform session
    #[arg(long)]
    pub cookies: PathBuf,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_WIDTH as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// External program to hand a download to when the direct fetch fails
    /// (invoked as `<program> <url> <dest-path>`)
    #[arg(long)]
    pub fallback_command: Option<String>,

    /// Override the platform GraphQL endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
