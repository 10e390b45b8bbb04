//! Fallback-chain field extraction for article pages.
//!
//! News-site themes move their markup around constantly, so no single
//! selector stays reliable for long. Every [`ArticleRecord`] field is
//! therefore resolved through an ordered chain of [`CompiledRule`]s:
//! rules are tried strictly in order and the first rule producing at
//! least one non-empty, trimmed result wins the field outright. Results
//! are never merged across rules.
//!
//! # Date gating
//!
//! The date field is special: it is resolved before anything else, and
//! the caller-supplied admission closure decides from the parsed date
//! whether the page is worth extracting at all. A rejected page yields
//! no record and costs nothing beyond the date lookup.

use crate::config::{CompiledFieldRules, CompiledRule};
use crate::dates::parse_article_date;
use crate::models::{post_id, ArticleRecord, PublishedDate};
use chrono::NaiveDate;
use scraper::{ElementRef, Html};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Extract one rule's value from a matched element.
///
/// With an attribute configured, yields that attribute's value;
/// otherwise yields the element's text fragments, each trimmed, joined
/// with single spaces. Whitespace-only results count as misses.
fn rule_value(element: &ElementRef, rule: &CompiledRule) -> Option<String> {
    let raw = match &rule.attr {
        Some(attr) => element.value().attr(attr)?.to_string(),
        None => element
            .text()
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolve a scalar field: first non-empty match of the first rule that
/// matches anything.
pub fn first_text(document: &Html, chain: &[CompiledRule]) -> Option<String> {
    for rule in chain {
        if let Some(value) = document
            .select(&rule.selector)
            .filter_map(|element| rule_value(&element, rule))
            .next()
        {
            debug!(rule = %rule.source, "Scalar rule matched");
            return Some(value);
        }
    }
    None
}

/// Resolve the body field: every match of the winning rule, in document
/// order, each trimmed, joined with single spaces.
pub fn joined_text(document: &Html, chain: &[CompiledRule]) -> Option<String> {
    for rule in chain {
        let fragments: Vec<String> = document
            .select(&rule.selector)
            .filter_map(|element| rule_value(&element, rule))
            .collect();
        if !fragments.is_empty() {
            debug!(rule = %rule.source, count = fragments.len(), "Body rule matched");
            return Some(fragments.join(" "));
        }
    }
    None
}

/// Resolve a list field: every match of the winning rule, in document
/// order. An empty vector when no rule matches.
pub fn first_list(document: &Html, chain: &[CompiledRule]) -> Vec<String> {
    for rule in chain {
        let values: Vec<String> = document
            .select(&rule.selector)
            .filter_map(|element| rule_value(&element, rule))
            .collect();
        if !values.is_empty() {
            return values;
        }
    }
    Vec::new()
}

/// Resolve a list field of URLs, making each absolute against the
/// page's own URL. Values that cannot be resolved are dropped.
pub fn first_url_list(document: &Html, chain: &[CompiledRule], base: &Url) -> Vec<String> {
    first_list(document, chain)
        .into_iter()
        .filter_map(|raw| match base.join(&raw) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(e) => {
                debug!(error = %e, value = %raw, "Dropping unresolvable URL");
                None
            }
        })
        .collect()
}

/// Extract an [`ArticleRecord`] from a parsed article page.
///
/// The date chain runs first and its parsed result (or `None` when the
/// chain missed or the raw value would not parse) goes to `admit`. When
/// `admit` rejects, the page is skipped and no other chain runs. An
/// admitted page always yields a record; unmatched scalar fields come
/// back empty and unmatched list fields come back as empty vectors.
///
/// # Arguments
///
/// * `document` - Parsed HTML of the article page
/// * `url` - The page's own absolute URL, used for `id` derivation and
///   relative-link resolution
/// * `rules` - Compiled per-field extraction chains
/// * `admit` - Date admission check of the active crawl strategy
///
/// # Returns
///
/// The extracted record, or `None` when `admit` rejected the page.
#[instrument(level = "debug", skip_all, fields(%url))]
pub fn extract_article<F>(
    document: &Html,
    url: &Url,
    rules: &CompiledFieldRules,
    admit: F,
) -> Option<ArticleRecord>
where
    F: FnOnce(Option<NaiveDate>) -> bool,
{
    let raw_date = first_text(document, &rules.date);
    let parsed = raw_date.as_deref().and_then(parse_article_date);
    if !admit(parsed) {
        info!(%url, date = ?parsed, "Skipping article outside the date window");
        return None;
    }

    let published_date = match (parsed, raw_date) {
        (Some(date), _) => Some(PublishedDate::Parsed(date)),
        (None, Some(raw)) => Some(PublishedDate::Raw(raw)),
        (None, None) => None,
    };

    let title = first_text(document, &rules.title).unwrap_or_default();
    let author = match first_text(document, &rules.author) {
        Some(author) => author,
        None => {
            warn!(%url, "No author rule matched");
            String::new()
        }
    };
    let text = joined_text(document, &rules.body).unwrap_or_default();

    Some(ArticleRecord {
        id: post_id(url),
        title,
        published_date,
        author,
        text,
        images: first_url_list(document, &rules.images, url),
        videos: first_url_list(document, &rules.videos, url),
        links: first_url_list(document, &rules.links, url),
        url: url.to_string(),
    })
}
