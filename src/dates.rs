//! Publication-date parsing and date-window filtering.
//!
//! Dates reach the crawler in two forms:
//!
//! 1. **Machine timestamps**: ISO-8601 strings from sitemap `<lastmod>`
//!    values and `article:published_time` meta tags, e.g.
//!    `2025-09-28T18:58:00+01:00` or plain `2025-09-28`.
//! 2. **Localized strings**: the visible Arabic date line on article
//!    pages, e.g. `"الأحد 28 سبتمبر 2025 - 18:58"` (weekday, day,
//!    month name, year, then a time after the `" - "` delimiter).
//!
//! Both paths reduce to a zone-naive [`NaiveDate`]: UTC markers and
//! numeric offsets are stripped, not converted, so every comparison in
//! the crawler happens on the site's own calendar. The Moroccan press
//! uses two transliteration systems for month names (e.g. `شتنبر` and
//! `سبتمبر` for September), so the month table carries both spellings
//! as separate entries.
//!
//! All parsers are pure: no state, no panics, `None` on any malformed
//! input.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Month-name table for Arabic dates, including Moroccan Darija and
/// Modern Standard Arabic spellings where they differ.
static ARABIC_MONTHS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        ("يناير", 1),
        ("فبراير", 2),
        ("مارس", 3),
        ("أبريل", 4),
        ("ماي", 5),
        ("مايو", 5),
        ("يونيو", 6),
        ("يوليو", 7),
        ("غشت", 8),
        ("أغسطس", 8),
        ("شتنبر", 9),
        ("سبتمبر", 9),
        ("أكتوبر", 10),
        ("نونبر", 11),
        ("نوفمبر", 11),
        ("دجنبر", 12),
        ("ديسمبر", 12),
    ])
});

/// `<day> <month-name> <year>` anywhere in the date portion of the line.
static DAY_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\s+([^\d\s]+)\s+(\d{4})").unwrap());

/// Inclusive calendar-date window; either bound may be open.
///
/// Constructed once at crawl start and read-only afterwards, so it can be
/// shared freely across concurrent callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    /// Inclusive lower bound; `None` means unbounded below.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound; `None` means unbounded above.
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    /// Whether any bound is set. A bounded window filters fail-closed:
    /// entries whose date cannot be established are excluded.
    pub fn is_bounded(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Inclusive containment check.
    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(from) = self.from {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if date > to {
                return false;
            }
        }
        true
    }
}

/// Parse an ISO-8601 timestamp or date into a zone-naive calendar date.
///
/// A trailing `Z` is stripped; a numeric offset introduced by `+` is cut
/// off rather than applied, since the crawler compares all dates as
/// naive values. Accepts full timestamps (with optional fractional
/// seconds) and bare `YYYY-MM-DD` dates, the two forms sitemaps emit.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    let stripped = match stripped.split_once('+') {
        Some((before_offset, _)) => before_offset,
        None => stripped,
    };

    if let Ok(datetime) = NaiveDateTime::parse_from_str(stripped, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(datetime.date());
    }
    NaiveDate::parse_from_str(stripped, "%Y-%m-%d").ok()
}

/// Parse a localized Arabic date line like `"الأحد 28 سبتمبر 2025 - 18:58"`.
///
/// The leading weekday name and the trailing time are discarded (only the
/// portion before the `" - "` delimiter is inspected), then a
/// day/month-name/year pattern is resolved through the month table.
/// Returns `None` for unknown month names and impossible calendar dates.
pub fn parse_arabic_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let date_part = match text.split_once(" - ") {
        Some((before_time, _)) => before_time.trim(),
        None => text,
    };

    let caps = DAY_MONTH_YEAR.captures(date_part)?;
    let day: u32 = caps[1].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let month = match ARABIC_MONTHS.get(&caps[2]) {
        Some(month) => *month,
        None => {
            debug!(token = &caps[2], "Unknown Arabic month name");
            return None;
        }
    };

    let date = NaiveDate::from_ymd_opt(year, month, day);
    if date.is_none() {
        debug!(day, month, year, "Day/month/year do not form a valid date");
    }
    date
}

/// Parse an article's date text, trying the ISO path first and the
/// localized Arabic path second.
pub fn parse_article_date(raw: &str) -> Option<NaiveDate> {
    parse_iso_date(raw).or_else(|| parse_arabic_date(raw))
}
