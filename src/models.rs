//! Data models for extracted articles and sitemap entries.
//!
//! This module defines the core data structures used throughout the crawler:
//! - [`ArticleRecord`]: One fully extracted article, the unit of feed output
//! - [`PublishedDate`]: A parsed calendar date, or the raw source string when
//!   extraction succeeded but parsing did not
//! - [`SitemapEntry`]: A single `<url>` element from a sitemap document,
//!   consumed once by the date filter and then discarded
//!
//! Records serialize with camelCase keys to match the JSON feed consumed
//! downstream, via `#[serde(rename_all = "camelCase")]`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

/// The publication date of an article as it appears in the output feed.
///
/// Pages carry dates in two shapes: machine timestamps in meta tags and
/// localized Arabic strings in visible markup. When either parses, the
/// feed carries the calendar date; when extraction found a date string
/// that no parser accepted, the raw text is kept rather than dropped so
/// downstream consumers can decide what to do with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PublishedDate {
    /// A successfully parsed calendar date, serialized as `YYYY-MM-DD`.
    Parsed(NaiveDate),
    /// The raw extracted string, kept verbatim when parsing failed.
    Raw(String),
}

/// A fully extracted news article.
///
/// This is the unit of output: one record per article page that survived
/// date gating. List fields are deduplicated (first occurrence wins) and
/// `text` is whitespace-collapsed by the normalization pass before the
/// record reaches the feed writer.
///
/// # Invariants
///
/// * `id` and `url` are never empty for an emitted record.
/// * `author` is the empty string when no extraction rule resolved it,
///   never absent.
/// * `images`, `videos`, and `links` hold absolute URLs; an article with
///   none of a kind carries an empty list, not a null.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    /// Stable identifier derived from the URL slug (see [`post_id`]).
    pub id: String,
    /// Article headline; empty if no title rule matched.
    pub title: String,
    /// Publication date, raw-string fallback, or absent.
    pub published_date: Option<PublishedDate>,
    /// Byline; empty string when unresolved.
    pub author: String,
    /// Body paragraphs joined by single spaces.
    pub text: String,
    /// Absolute image URLs in document order.
    pub images: Vec<String>,
    /// Absolute video/embed URLs in document order.
    pub videos: Vec<String>,
    /// Absolute outbound link URLs in document order.
    pub links: Vec<String>,
    /// Canonical URL of the source page.
    pub url: String,
}

impl ArticleRecord {
    /// The parsed publication date, if one was resolved.
    pub fn published_on(&self) -> Option<NaiveDate> {
        match &self.published_date {
            Some(PublishedDate::Parsed(date)) => Some(*date),
            _ => None,
        }
    }
}

/// One `<url>` entry from a sitemap document.
///
/// Transient: produced by the sitemap parser, consumed by the last-modified
/// filter, never persisted. `last_modified` is kept as the raw string from
/// the document; parsing happens at filter time so an unparseable value can
/// be logged with its original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    /// Target URL of the entry (may be relative to the sitemap's own URL).
    pub location: String,
    /// Raw `<lastmod>` value, when the sitemap provided one.
    pub last_modified: Option<String>,
}

/// Derive a stable article id from a URL.
///
/// Uses the final non-empty path segment, percent-decoded, which on the
/// target site is the Arabic post slug. Falls back to the full URL when the
/// path has no usable segment (e.g. the site root).
///
/// # Examples
///
/// ```ignore
/// let url = Url::parse("https://example.ma/%d9%85%d9%82%d8%a7%d9%84/").unwrap();
/// assert_eq!(post_id(&url), "مقال");
/// ```
pub fn post_id(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()));

    match segment {
        Some(seg) => urlencoding::decode(seg)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| seg.to_string()),
        None => url.to_string(),
    }
}
