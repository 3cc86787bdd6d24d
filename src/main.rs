//! CLI entry point for the media mirror tool.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mirror_core::auth::{AuthProvider, HtmlTokenSource, load_cookies_into_jar, parse_netscape_cookies};
use mirror_core::download::{CommandFallback, FallbackTransport, NoFallback};
use mirror_core::graph::{
    DEFAULT_GRAPHQL_ENDPOINT, DEFAULT_TOKEN_HOME_PAGE, DEFAULT_TOKEN_UPLOAD_PAGE, GraphClient,
    GraphListing, GraphResolver, entity_about,
};
use mirror_core::{HttpTransport, ItemDownloader, MediaKind, Mirror, MirrorError, TaskPool};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// Browser-like user agent; the platform serves the token-bearing pages
/// and the GraphQL endpoint to browser sessions only.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";

const CONNECT_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Media mirror starting");

    // The exported browser session rides along on every request.
    let cookie_file = File::open(&args.cookies)
        .with_context(|| format!("failed to open cookie file {}", args.cookies.display()))?;
    let cookies = parse_netscape_cookies(BufReader::new(cookie_file))
        .with_context(|| format!("failed to parse cookie file {}", args.cookies.display()))?;
    info!(cookies = cookies.len(), "loaded session cookies");
    let jar = load_cookies_into_jar(&cookies);

    let http = reqwest::Client::builder()
        .cookie_provider(jar)
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .context("failed to build HTTP client")?;

    let auth = Arc::new(AuthProvider::new(Box::new(HtmlTokenSource::new(
        http.clone(),
        DEFAULT_TOKEN_UPLOAD_PAGE,
        DEFAULT_TOKEN_HOME_PAGE,
    ))));

    let endpoint = args
        .endpoint
        .as_deref()
        .unwrap_or(DEFAULT_GRAPHQL_ENDPOINT)
        .parse()
        .context("invalid GraphQL endpoint URL")?;
    let client = Arc::new(GraphClient::new(http.clone(), endpoint, auth));

    let entity = entity_about(&client, &args.entity)
        .await
        .with_context(|| format!("failed to look up entity {}", args.entity))?;
    let media = MediaKind::from(args.media);
    info!(
        name = %entity.name,
        id = %entity.id,
        kind = ?entity.kind,
        collection = %media,
        "resolved mirror target"
    );

    let listing = Arc::new(GraphListing::new(Arc::clone(&client), &entity, media)?);
    let resolver = Arc::new(GraphResolver::new(Arc::clone(&client)));

    // The media transport shares the cookie jar; some media URLs are
    // session-gated.
    let primary = Arc::new(HttpTransport::with_client(http));
    let fallback: Arc<dyn FallbackTransport> = match &args.fallback_command {
        Some(program) => {
            debug!(program, "fallback agent configured");
            Arc::new(CommandFallback::new(program))
        }
        None => Arc::new(NoFallback),
    };
    let downloader = Arc::new(ItemDownloader::new(resolver, primary, fallback));

    let pool = TaskPool::new(usize::from(args.concurrency))?;
    let dest_dir = args.output.join(format!("{}_{media}", entity.id));

    let mirror = Mirror::new(listing, downloader, pool, &dest_dir);
    let stop = mirror.stop_handle();

    // First Ctrl-C stops cooperatively: in-flight downloads finish, no new
    // ones start.
    let ctrlc_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight downloads");
            ctrlc_stop.stop();
        }
    });

    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {pos} items settled {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    };
    let progress_bar = bar.clone();
    let mirror = mirror.with_progress(Arc::new(move |progress| {
        progress_bar.inc(1);
        progress_bar.set_message(format!(
            "({} downloaded, {} failed)",
            progress.downloaded_so_far, progress.failed_so_far
        ));
    }));

    let result = mirror.run().await;
    bar.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(MirrorError::Listing { source, partial }) => {
            warn!(
                downloaded = partial.downloaded,
                failed = partial.failed,
                "listing failed mid-run; partial mirror kept on disk"
            );
            return Err(anyhow::Error::new(source).context("listing failed"));
        }
    };

    info!(
        downloaded = report.downloaded,
        failed = report.failed,
        used_fallback = report.used_fallback,
        discovered = report.discovered,
        dest = %dest_dir.display(),
        "Mirror complete"
    );

    Ok(())
}
