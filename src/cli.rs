//! Command-line interface definitions for Jarida.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Dates can be provided via command-line flags or environment variables.

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

/// How article URLs are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Walk the sitemap index and filter entries by last-modified date.
    Sitemap,
    /// Paginate the category listing until the stop date is reached.
    Listing,
}

/// Command-line arguments for the Jarida crawler.
///
/// This struct defines all configuration options that can be passed to the
/// application at runtime: discovery strategy, date bounds, site profile,
/// and output location.
///
/// # Examples
///
/// ```sh
/// # Crawl the default category listing into ./data
/// jarida
///
/// # Sitemap crawl over a date window
/// jarida --strategy sitemap --from-date 2025-09-01 --to-date 2025-09-30
///
/// # Listing crawl that halts at a boundary date, custom site profile
/// jarida --stop-date 2025-09-21 --config thevoice.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the JSON feed
    #[arg(short, long, default_value = "data")]
    pub output_dir: String,

    /// Discovery strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::Listing)]
    pub strategy: Strategy,

    /// Only emit articles published on or after this date (YYYY-MM-DD)
    #[arg(long, env = "JARIDA_FROM_DATE")]
    pub from_date: Option<NaiveDate>,

    /// Only emit articles published on or before this date (YYYY-MM-DD)
    #[arg(long, env = "JARIDA_TO_DATE")]
    pub to_date: Option<NaiveDate>,

    /// Halt the listing crawl once an article dated on or before this
    /// date is seen (YYYY-MM-DD)
    #[arg(long, env = "JARIDA_STOP_DATE")]
    pub stop_date: Option<NaiveDate>,

    /// Optional path to a site profile YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Politeness delay between requests, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub delay_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["jarida"]);

        assert_eq!(cli.output_dir, "data");
        assert_eq!(cli.strategy, Strategy::Listing);
        assert!(cli.from_date.is_none());
        assert!(cli.to_date.is_none());
        assert!(cli.stop_date.is_none());
        assert!(cli.config.is_none());
        assert_eq!(cli.delay_ms, 500);
    }

    #[test]
    fn test_cli_parses_dates_and_strategy() {
        let cli = Cli::parse_from([
            "jarida",
            "--strategy",
            "sitemap",
            "--from-date",
            "2025-09-01",
            "--to-date",
            "2025-09-30",
        ]);

        assert_eq!(cli.strategy, Strategy::Sitemap);
        assert_eq!(cli.from_date, NaiveDate::from_ymd_opt(2025, 9, 1));
        assert_eq!(cli.to_date, NaiveDate::from_ymd_opt(2025, 9, 30));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["jarida", "-o", "/tmp/feed", "-s", "listing"]);

        assert_eq!(cli.output_dir, "/tmp/feed");
        assert_eq!(cli.strategy, Strategy::Listing);
    }

    #[test]
    fn test_cli_rejects_malformed_date() {
        assert!(Cli::try_parse_from(["jarida", "--from-date", "28-09-2025"]).is_err());
    }
}
