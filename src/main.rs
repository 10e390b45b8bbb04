//! # Jarida
//!
//! A crawler for Moroccan news sites that discovers article pages via
//! sitemap traversal or category pagination, extracts structured fields
//! through ordered fallback selector chains, filters articles by
//! publication date, and writes the results to a JSON feed.
//!
//! ## Features
//!
//! - Sitemap discovery with regex-selected nested sitemaps and a
//!   fail-closed last-modified filter
//! - Sequential category pagination with a hard stop date
//! - Per-field selector fallback chains tolerant of theme changes
//! - Arabic and ISO publication-date parsing (Moroccan month spellings
//!   included)
//! - Whitespace and duplicate-URL normalization before output
//!
//! ## Usage
//!
//! ```sh
//! jarida --strategy sitemap --from-date 2025-09-01 --to-date 2025-09-30
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Discovery**: Collect article URLs from the sitemap tree or the
//!    category listing pages
//! 2. **Extraction**: Resolve each field through its fallback chain,
//!    gated on the article date
//! 3. **Normalization**: Collapse whitespace and de-duplicate URL lists
//! 4. **Output**: Write the `articles.json` feed

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod crawl;
mod dates;
mod extract;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod utils;

use cli::{Cli, Strategy};
use crawl::{CrawlState, CrawlStats};
use dates::DateWindow;
use fetch::build_fetcher;
use outputs::json;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("jarida starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(
        ?args.strategy,
        ?args.from_date,
        ?args.to_date,
        ?args.stop_date,
        ?args.config,
        "Parsed CLI arguments"
    );

    // Early check: ensure the output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load and compile the site profile ----
    let profile = config::load_profile(args.config.as_deref())?.compile()?;
    info!(
        listing = %profile.listing_url,
        sitemap = %profile.sitemap_url,
        "Site profile ready"
    );

    let fetcher = build_fetcher(StdDuration::from_millis(args.delay_ms))?;
    let stats = CrawlStats::new();

    // ---- Crawl ----
    let records = match args.strategy {
        Strategy::Sitemap => {
            let window = DateWindow::new(args.from_date, args.to_date);
            crawl::sitemap::run(&fetcher, &profile, &window, &stats).await?
        }
        Strategy::Listing => {
            let to_date = args.to_date.unwrap_or_else(|| Local::now().date_naive());
            let window = DateWindow::new(args.from_date, Some(to_date));
            let state = CrawlState::new();
            crawl::listing::crawl(&fetcher, &profile, &window, args.stop_date, &state, &stats)
                .await?
        }
    };

    // ---- Normalize and write ----
    let records: Vec<_> = records.into_iter().map(pipeline::normalize).collect();

    if let Err(e) = json::write_feed(&records, &args.output_dir).await {
        error!(error = %e, "Failed to write JSON feed");
        return Err(e);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        articles = stats.articles_found(),
        pages = stats.pages_fetched(),
        skipped = stats.articles_skipped(),
        entries_passed = stats.entries_passed(),
        entries_filtered = stats.entries_filtered(),
        "Execution complete"
    );

    Ok(())
}
