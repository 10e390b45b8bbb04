//! Category pagination crawling.
//!
//! Walks a category listing page by page, following article links and
//! the next-page link, strictly sequentially. The site serves newest
//! articles first, so once one article at or before the stop date shows
//! up, everything further down is older and the whole crawl halts: the
//! [`CrawlState`] flag latches inside article admission and every
//! pending link-follow on the current page is abandoned.
//!
//! # Link Selection
//!
//! Article links and the next-page link each come from their own
//! ordered candidate chains; the first candidate yielding anything
//! wins. Raw hrefs containing the configured category-path substring
//! are listing pages, not articles, and are excluded from follow-up.
//! The next-page href itself usually contains that substring, which is
//! why the exclusion applies only to article links.

use crate::config::CompiledProfile;
use crate::crawl::{CrawlState, CrawlStats};
use crate::dates::DateWindow;
use crate::extract::{extract_article, first_list, first_text};
use crate::fetch::FetchAsync;
use crate::models::ArticleRecord;
use crate::utils::truncate_for_log;
use chrono::NaiveDate;
use scraper::Html;
use std::collections::HashSet;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

/// Extract article links from a listing page.
///
/// Candidates are tried in order; the first yielding any link wins.
/// Raw hrefs containing the category-path substring are other listing
/// pages, not articles, and are dropped before resolution. The check
/// runs on the href as written: a relative href would pick up the
/// substring from the listing URL during resolution.
fn article_links(document: &Html, base: &Url, profile: &CompiledProfile) -> Vec<Url> {
    let mut links = Vec::new();
    for raw in first_list(document, &profile.listing.articles) {
        if raw.contains(&profile.category_path) {
            debug!(link = %raw, "Excluding category link");
            continue;
        }
        match base.join(&raw) {
            Ok(resolved) => links.push(resolved),
            Err(e) => {
                debug!(error = %e, value = %raw, "Dropping unresolvable article link");
            }
        }
    }
    links
}

/// Find the next listing page, if any.
fn next_page(document: &Html, base: &Url, profile: &CompiledProfile) -> Option<Url> {
    let raw = first_text(document, &profile.listing.next_page)?;
    match base.join(&raw) {
        Ok(resolved) => Some(resolved),
        Err(e) => {
            debug!(error = %e, value = %raw, "Dropping unresolvable next-page link");
            None
        }
    }
}

/// Date admission for the listing strategy.
///
/// An article without a parsed date is never emitted here (unlike the
/// sitemap strategy, pagination has no lastmod to fall back on). A date
/// at or before the stop boundary latches the stop flag and rejects the
/// article; this takes precedence over the window, which otherwise
/// decides emission.
fn admit_article(
    date: Option<NaiveDate>,
    window: &DateWindow,
    stop_date: Option<NaiveDate>,
    state: &CrawlState,
) -> bool {
    let Some(date) = date else {
        return false;
    };
    if let Some(stop) = stop_date {
        if date <= stop {
            info!(%date, %stop, "Reached stop date; halting crawl");
            state.stop();
            return false;
        }
    }
    window.contains(date)
}

/// Fetch one article link and extract its record.
#[instrument(level = "info", skip_all, fields(%url))]
async fn fetch_article<F>(
    fetcher: &F,
    url: &Url,
    profile: &CompiledProfile,
    window: &DateWindow,
    stop_date: Option<NaiveDate>,
    state: &CrawlState,
    stats: &CrawlStats,
) -> Option<ArticleRecord>
where
    F: FetchAsync,
{
    let body = match fetcher.fetch(url).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, %url, "Article fetch failed");
            return None;
        }
    };
    stats.record_page_fetched();

    let record = {
        let document = Html::parse_document(&body);
        extract_article(&document, url, &profile.article, |date| {
            admit_article(date, window, stop_date, state)
        })
    };

    match record {
        Some(record) => {
            let count = stats.record_article_found();
            info!(
                count,
                date = ?record.published_on(),
                title = %truncate_for_log(&record.title, 50),
                "Extracted article"
            );
            Some(record)
        }
        None => {
            stats.record_article_skipped();
            None
        }
    }
}

/// Run the pagination strategy from the profile's listing URL.
///
/// Pages are crawled strictly one after another. The stop flag is
/// checked before every article follow and before requesting the next
/// page, so once it latches, no further fetches are scheduled. Visited
/// pages are tracked, and a next-page link pointing back at one ends
/// the crawl instead of looping.
///
/// # Arguments
///
/// * `fetcher` - Page fetcher
/// * `profile` - Compiled site profile
/// * `window` - Emission window for extracted articles
/// * `stop_date` - Hard boundary; an article dated at or before it
///   halts the crawl
/// * `state` - Shared stop flag for this run
/// * `stats` - Run counters
///
/// # Returns
///
/// Extracted records in crawl order. Only a failure on the first
/// listing page aborts with an error; a later page that cannot be
/// fetched ends the crawl with the records collected so far.
#[instrument(level = "info", skip_all, fields(start = %profile.listing_url))]
pub async fn crawl<F>(
    fetcher: &F,
    profile: &CompiledProfile,
    window: &DateWindow,
    stop_date: Option<NaiveDate>,
    state: &CrawlState,
    stats: &CrawlStats,
) -> Result<Vec<ArticleRecord>, Box<dyn Error>>
where
    F: FetchAsync,
{
    let mut records = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut next_url = Some(profile.listing_url.clone());
    let mut page_number = 0usize;

    while let Some(current) = next_url.take() {
        if state.is_stopped() {
            break;
        }
        page_number += 1;
        visited.insert(current.to_string());

        let body = match fetcher.fetch(&current).await {
            Ok(body) => body,
            Err(e) if page_number == 1 => return Err(e),
            Err(e) => {
                error!(
                    error = %e,
                    url = %current,
                    page = page_number,
                    "Listing page fetch failed; keeping what was collected"
                );
                break;
            }
        };
        stats.record_page_fetched();
        let (links, next) = {
            let document = Html::parse_document(&body);
            (
                article_links(&document, &current, profile),
                next_page(&document, &current, profile),
            )
        };
        info!(
            page = page_number,
            links = links.len(),
            url = %current,
            "Scanned listing page"
        );

        for link in links {
            if state.is_stopped() {
                break;
            }
            if let Some(record) =
                fetch_article(fetcher, &link, profile, window, stop_date, state, stats).await
            {
                records.push(record);
            }
        }

        if state.is_stopped() {
            info!(page = page_number, "Stop flag set; abandoning remaining pages");
            break;
        }
        next_url = match next {
            Some(next) if visited.contains(next.as_str()) => {
                info!(page = page_number, url = %next, "Next page already visited; crawl complete");
                None
            }
            None => {
                info!(page = page_number, "No next page link; crawl complete");
                None
            }
            next => next,
        };
    }

    info!(count = records.len(), pages = page_number, "Listing crawl finished");
    Ok(records)
}
