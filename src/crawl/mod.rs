//! Crawl strategies for discovering and extracting articles.
//!
//! This module contains one submodule per discovery strategy:
//!
//! | Strategy | Module | Method | Notes |
//! |----------|--------|--------|-------|
//! | Sitemap | [`sitemap`] | XML sitemap traversal | Follows nested sitemaps matching configured patterns |
//! | Listing | [`listing`] | Category pagination | Sequential, halts at a stop date |
//!
//! # Common Patterns
//!
//! Each strategy module exports an async `run`/`crawl` entry point that
//! takes a [`FetchAsync`](crate::fetch::FetchAsync) implementation, the
//! compiled site profile, and a date window, and returns the extracted
//! [`ArticleRecord`](crate::models::ArticleRecord)s.
//!
//! Both strategies share:
//! - [`CrawlStats`]: advisory counters reported at the end of a run
//! - Date admission through the extractor's gating closure
//!
//! The listing strategy additionally threads a [`CrawlState`] through
//! its callbacks; the sitemap strategy has no stop flag.

pub mod listing;
pub mod sitemap;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Shared stop flag for one pagination crawl run.
///
/// Set permanently once an article at or past the stop boundary is
/// observed; never cleared. Checks and sets use `SeqCst` so that once
/// any callback sees the flag, no callback schedules further fetches.
#[derive(Debug, Default)]
pub struct CrawlState {
    stopped: AtomicBool,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Latch the stop flag. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Advisory counters for one crawl run.
///
/// Not correctness-critical; reported once at the end of the run so
/// operators can see how hard the date filters are working.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pages_fetched: AtomicUsize,
    articles_found: AtomicUsize,
    articles_skipped: AtomicUsize,
    entries_passed: AtomicUsize,
    entries_filtered: AtomicUsize,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::SeqCst);
    }

    /// Count an emitted article; returns the running total.
    pub fn record_article_found(&self) -> usize {
        self.articles_found.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_article_skipped(&self) {
        self.articles_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_entry_passed(&self) {
        self.entries_passed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_entry_filtered(&self) {
        self.entries_filtered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched.load(Ordering::SeqCst)
    }

    pub fn articles_found(&self) -> usize {
        self.articles_found.load(Ordering::SeqCst)
    }

    pub fn articles_skipped(&self) -> usize {
        self.articles_skipped.load(Ordering::SeqCst)
    }

    pub fn entries_passed(&self) -> usize {
        self.entries_passed.load(Ordering::SeqCst)
    }

    pub fn entries_filtered(&self) -> usize {
        self.entries_filtered.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_state_latches() {
        let state = CrawlState::new();
        assert!(!state.is_stopped());
        state.stop();
        assert!(state.is_stopped());
        state.stop();
        assert!(state.is_stopped());
    }

    #[test]
    fn test_stats_count_and_report() {
        let stats = CrawlStats::new();
        stats.record_page_fetched();
        stats.record_entry_passed();
        stats.record_entry_filtered();
        stats.record_entry_filtered();
        assert_eq!(stats.record_article_found(), 1);
        assert_eq!(stats.record_article_found(), 2);
        stats.record_article_skipped();

        assert_eq!(stats.pages_fetched(), 1);
        assert_eq!(stats.articles_found(), 2);
        assert_eq!(stats.articles_skipped(), 1);
        assert_eq!(stats.entries_passed(), 1);
        assert_eq!(stats.entries_filtered(), 2);
    }
}
