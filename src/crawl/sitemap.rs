//! Sitemap-driven article discovery.
//!
//! WordPress news sites expose a root sitemap index (`wp-sitemap.xml`)
//! whose nested sitemaps cover posts, pages, categories, and authors.
//! Only the post sitemaps are worth crawling, so nested sitemaps are
//! selected by regex match against their own location before being
//! descended into.
//!
//! # Flow
//!
//! 1. Fetch the root index and walk every matching nested sitemap,
//!    breadth-first, collecting `<url>` entries ([`discover`]).
//! 2. Filter entries by their `<lastmod>` value against the configured
//!    date window ([`filter_entries`]).
//! 3. Fetch each surviving entry and run field extraction ([`run`]).
//!
//! # Filter Policy
//!
//! With any window bound set, an entry missing `<lastmod>` (or carrying
//! one that does not parse) is excluded: its date cannot be verified, so
//! the crawl does not spend a fetch on it. With no bounds, everything
//! passes untouched.

use crate::config::CompiledProfile;
use crate::crawl::CrawlStats;
use crate::dates::{parse_iso_date, DateWindow};
use crate::extract::extract_article;
use crate::fetch::FetchAsync;
use crate::models::{ArticleRecord, SitemapEntry};
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use scraper::Html;
use std::collections::{HashSet, VecDeque};
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// A parsed sitemap document: either an index of nested sitemaps or a
/// set of page entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of nested sitemaps.
    Index(Vec<String>),
    /// `<urlset>`: page entries with optional last-modified values.
    UrlSet(Vec<SitemapEntry>),
}

/// Parse a sitemap XML document.
///
/// Handles both `<sitemapindex>` and `<urlset>` layouts. A document
/// containing any `<sitemap>` elements is treated as an index; entries
/// keep their raw `<lastmod>` text for the filter stage.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut in_url = false;
    let mut in_sitemap = false;
    let mut current_tag = String::new();
    let mut current_loc = String::new();
    let mut current_lastmod = String::new();
    let mut nested = Vec::new();
    let mut entries = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "url" => {
                        in_url = true;
                        current_loc.clear();
                        current_lastmod.clear();
                    }
                    "sitemap" => {
                        in_sitemap = true;
                        current_loc.clear();
                    }
                    _ => {
                        current_tag = name;
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "url" if in_url => {
                        if !current_loc.is_empty() {
                            entries.push(SitemapEntry {
                                location: current_loc.clone(),
                                last_modified: if current_lastmod.is_empty() {
                                    None
                                } else {
                                    Some(current_lastmod.clone())
                                },
                            });
                        }
                        in_url = false;
                    }
                    "sitemap" if in_sitemap => {
                        if !current_loc.is_empty() {
                            nested.push(current_loc.clone());
                        }
                        in_sitemap = false;
                    }
                    _ => {
                        if name == current_tag {
                            current_tag.clear();
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.xml_content().unwrap_or_default();
                if (in_url || in_sitemap) && current_tag == "loc" {
                    current_loc.push_str(text.trim());
                } else if in_url && current_tag == "lastmod" {
                    current_lastmod.push_str(text.trim());
                }
            }
            // references like &amp; arrive as their own event, splitting
            // the surrounding text run into fragments
            Ok(Event::GeneralRef(e)) => {
                let resolved = match e.resolve_char_ref() {
                    Ok(Some(ch)) => Some(ch.to_string()),
                    Ok(None) => {
                        let name = e.xml_content().unwrap_or_default();
                        resolve_predefined_entity(&name).map(str::to_string)
                    }
                    Err(_) => None,
                };
                match resolved {
                    Some(resolved) => {
                        if (in_url || in_sitemap) && current_tag == "loc" {
                            current_loc.push_str(&resolved);
                        } else if in_url && current_tag == "lastmod" {
                            current_lastmod.push_str(&resolved);
                        }
                    }
                    None => {
                        debug!(
                            reference = %String::from_utf8_lossy(&e),
                            "Skipping unresolvable reference"
                        );
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!("XML parse error: {e}").into());
            }
            _ => {}
        }
        buf.clear();
    }

    if nested.is_empty() {
        Ok(SitemapDocument::UrlSet(entries))
    } else {
        Ok(SitemapDocument::Index(nested))
    }
}

/// Whether a nested sitemap location should be descended into.
/// An empty pattern list descends into everything.
fn follows_pattern(location: &str, patterns: &[Regex]) -> bool {
    patterns.is_empty() || patterns.iter().any(|pattern| pattern.is_match(location))
}

/// Whether one entry survives the date window.
fn admit_entry(entry: &SitemapEntry, window: &DateWindow) -> bool {
    if !window.is_bounded() {
        return true;
    }
    match &entry.last_modified {
        None => {
            debug!(location = %entry.location, "Excluding entry without lastmod");
            false
        }
        Some(raw) => match parse_iso_date(raw) {
            Some(date) => window.contains(date),
            None => {
                debug!(
                    location = %entry.location,
                    lastmod = %raw,
                    "Excluding entry with unparseable lastmod"
                );
                false
            }
        },
    }
}

/// Filter sitemap entries by their last-modified value.
///
/// Lazy: works over any entry iterable without materializing it, and
/// counts passed/filtered entries into `stats` as it goes.
pub fn filter_entries<'a, I>(
    entries: I,
    window: &'a DateWindow,
    stats: &'a CrawlStats,
) -> impl Iterator<Item = SitemapEntry> + 'a
where
    I: IntoIterator<Item = SitemapEntry>,
    I::IntoIter: 'a,
{
    entries.into_iter().filter(move |entry| {
        let keep = admit_entry(entry, window);
        if keep {
            stats.record_entry_passed();
        } else {
            stats.record_entry_filtered();
        }
        keep
    })
}

/// Route a parsed sitemap: nested index locations onto the queue (when
/// they match a pattern and have not been seen), page entries into the
/// collected list.
fn enqueue_or_collect(
    document: SitemapDocument,
    base: &Url,
    profile: &CompiledProfile,
    queue: &mut VecDeque<Url>,
    seen: &mut HashSet<String>,
    entries: &mut Vec<SitemapEntry>,
) {
    match document {
        SitemapDocument::Index(nested) => {
            for location in nested {
                let resolved = match base.join(&location) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        debug!(error = %e, %location, "Skipping unresolvable sitemap location");
                        continue;
                    }
                };
                if !follows_pattern(resolved.as_str(), &profile.sitemap_patterns) {
                    debug!(location = %resolved, "No pattern match; not descending");
                    continue;
                }
                if seen.insert(resolved.to_string()) {
                    queue.push_back(resolved);
                }
            }
        }
        SitemapDocument::UrlSet(urls) => entries.extend(urls),
    }
}

/// Walk the sitemap tree and collect every page entry from matching
/// nested sitemaps.
///
/// The root index must fetch and parse; after that, a nested sitemap
/// that fails to fetch or parse is logged and skipped without aborting
/// the walk.
///
/// # Returns
///
/// The unfiltered entries, or an error if the root sitemap itself was
/// unreachable.
#[instrument(level = "info", skip_all, fields(root = %profile.sitemap_url))]
pub async fn discover<F>(
    fetcher: &F,
    profile: &CompiledProfile,
    stats: &CrawlStats,
) -> Result<Vec<SitemapEntry>, Box<dyn Error>>
where
    F: FetchAsync,
{
    let mut queue: VecDeque<Url> = VecDeque::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries: Vec<SitemapEntry> = Vec::new();
    seen.insert(profile.sitemap_url.to_string());

    let root = fetcher.fetch(&profile.sitemap_url).await?;
    stats.record_page_fetched();
    enqueue_or_collect(
        parse_sitemap(&root)?,
        &profile.sitemap_url,
        profile,
        &mut queue,
        &mut seen,
        &mut entries,
    );

    while let Some(url) = queue.pop_front() {
        let xml = match fetcher.fetch(&url).await {
            Ok(xml) => xml,
            Err(e) => {
                error!(error = %e, %url, "Nested sitemap fetch failed; skipping");
                continue;
            }
        };
        stats.record_page_fetched();
        match parse_sitemap(&xml) {
            Ok(document) => {
                enqueue_or_collect(document, &url, profile, &mut queue, &mut seen, &mut entries)
            }
            Err(e) => warn!(error = %e, %url, "Nested sitemap failed to parse; skipping"),
        }
    }

    info!(
        count = entries.len(),
        sitemaps = seen.len(),
        "Collected sitemap entries"
    );
    Ok(entries)
}

/// Fetch one admitted entry and extract its article.
///
/// The page-level date gate applies the same fail-closed policy as the
/// entry filter: with a bounded window, a page whose date cannot be
/// parsed is skipped.
#[instrument(level = "info", skip_all, fields(%location))]
async fn fetch_article<F>(
    fetcher: &F,
    location: &str,
    profile: &CompiledProfile,
    window: &DateWindow,
    stats: &CrawlStats,
) -> Option<ArticleRecord>
where
    F: FetchAsync,
{
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(e) => {
            debug!(error = %e, "Skipping entry with invalid URL");
            return None;
        }
    };
    let body = match fetcher.fetch(&url).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, %url, "Article fetch failed");
            return None;
        }
    };
    stats.record_page_fetched();

    let record = {
        let document = Html::parse_document(&body);
        extract_article(&document, &url, &profile.article, |date| match date {
            Some(date) => window.contains(date),
            None => !window.is_bounded(),
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

/// Run the full sitemap strategy: discover, filter, fetch, extract.
///
/// # Arguments
///
/// * `fetcher` - Page fetcher
/// * `profile` - Compiled site profile
/// * `window` - Date window applied to entries and extracted articles
/// * `stats` - Run counters
///
/// # Returns
///
/// Extracted records in sitemap order, or an error if the root sitemap
/// was unreachable.
#[instrument(level = "info", skip_all)]
pub async fn run<F>(
    fetcher: &F,
    profile: &CompiledProfile,
    window: &DateWindow,
    stats: &CrawlStats,
) -> Result<Vec<ArticleRecord>, Box<dyn Error>>
where
    F: FetchAsync,
{
    let entries = discover(fetcher, profile, stats).await?;
    let admitted: Vec<SitemapEntry> = filter_entries(entries, window, stats).collect();
    info!(
        passed = stats.entries_passed(),
        filtered = stats.entries_filtered(),
        "Applied sitemap date filter"
    );

    let records: Vec<ArticleRecord> = stream::iter(admitted)
        .then(|entry| async move {
            fetch_article(fetcher, &entry.location, profile, window, stats).await
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    info!(count = records.len(), "Sitemap crawl finished");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://news.test/a/</loc><lastmod>2025-09-25T10:00:00+00:00</lastmod></url>
  <url><loc>https://news.test/b/</loc></url>
</urlset>"#;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://news.test/wp-sitemap-posts-post-1.xml</loc></sitemap>
  <sitemap><loc>https://news.test/wp-sitemap-users-1.xml</loc></sitemap>
</sitemapindex>"#;

    fn entry(location: &str, lastmod: Option<&str>) -> SitemapEntry {
        SitemapEntry {
            location: location.to_string(),
            last_modified: lastmod.map(str::to_string),
        }
    }

    fn window(from: Option<(i32, u32, u32)>, to: Option<(i32, u32, u32)>) -> DateWindow {
        DateWindow::new(
            from.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            to.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
        )
    }

    #[test]
    fn test_parse_urlset_keeps_raw_lastmod() {
        let document = parse_sitemap(URLSET).unwrap();
        assert_eq!(
            document,
            SitemapDocument::UrlSet(vec![
                entry("https://news.test/a/", Some("2025-09-25T10:00:00+00:00")),
                entry("https://news.test/b/", None),
            ])
        );
    }

    #[test]
    fn test_parse_index_lists_nested_locations() {
        let document = parse_sitemap(INDEX).unwrap();
        assert_eq!(
            document,
            SitemapDocument::Index(vec![
                "https://news.test/wp-sitemap-posts-post-1.xml".to_string(),
                "https://news.test/wp-sitemap-users-1.xml".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_unescapes_entities_in_locations() {
        let xml = r#"<urlset>
  <url><loc>https://news.test/?p=1&amp;cat=societe</loc></url>
</urlset>"#;
        let document = parse_sitemap(xml).unwrap();
        assert_eq!(
            document,
            SitemapDocument::UrlSet(vec![entry("https://news.test/?p=1&cat=societe", None)])
        );
    }

    #[test]
    fn test_parse_rejects_malformed_xml() {
        assert!(parse_sitemap("<urlset><url><loc>x</url>").is_err());
    }

    #[test]
    fn test_filter_keeps_only_verifiable_in_window_entries() {
        let entries = vec![
            entry("https://news.test/a/", Some("2025-09-20T00:00:00Z")),
            entry("https://news.test/b/", Some("2025-09-25T00:00:00Z")),
            entry("https://news.test/c/", None),
        ];
        let window = window(Some((2025, 9, 21)), Some((2025, 9, 30)));
        let stats = CrawlStats::new();

        let kept: Vec<String> = filter_entries(entries, &window, &stats)
            .map(|entry| entry.location)
            .collect();

        assert_eq!(kept, vec!["https://news.test/b/"]);
        assert_eq!(stats.entries_passed(), 1);
        assert_eq!(stats.entries_filtered(), 2);
    }

    #[test]
    fn test_filter_passes_everything_when_unbounded() {
        let entries = vec![
            entry("https://news.test/a/", Some("2025-09-20")),
            entry("https://news.test/b/", None),
            entry("https://news.test/c/", Some("not a date")),
        ];
        let window = window(None, None);
        let stats = CrawlStats::new();

        assert_eq!(filter_entries(entries, &window, &stats).count(), 3);
        assert_eq!(stats.entries_passed(), 3);
        assert_eq!(stats.entries_filtered(), 0);
    }

    #[test]
    fn test_filter_excludes_unparseable_lastmod_when_bounded() {
        let entries = vec![entry("https://news.test/a/", Some("last tuesday"))];
        let window = window(Some((2025, 9, 1)), None);
        let stats = CrawlStats::new();

        assert_eq!(filter_entries(entries, &window, &stats).count(), 0);
        assert_eq!(stats.entries_filtered(), 1);
    }

    #[test]
    fn test_follows_pattern_empty_means_descend_all() {
        assert!(follows_pattern("https://news.test/anything.xml", &[]));
        let patterns = vec![Regex::new("wp-sitemap-posts").unwrap()];
        assert!(follows_pattern(
            "https://news.test/wp-sitemap-posts-post-1.xml",
            &patterns
        ));
        assert!(!follows_pattern(
            "https://news.test/wp-sitemap-users-1.xml",
            &patterns
        ));
    }

    #[derive(Debug)]
    struct StubFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(pages: Vec<(&str, String)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(url, body)| (url.to_string(), body))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self, url: &str) -> bool {
            self.requests.lock().unwrap().iter().any(|r| r == url)
        }
    }

    impl FetchAsync for StubFetcher {
        async fn fetch(&self, url: &Url) -> Result<String, Box<dyn Error>> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| format!("no fixture for {url}").into())
        }
    }

    fn test_profile() -> CompiledProfile {
        let mut profile = SiteProfile::default();
        profile.sitemap_url = "https://news.test/wp-sitemap.xml".to_string();
        profile.compile().unwrap()
    }

    fn article_page(date: &str) -> String {
        format!(
            "<html><body><h1 class=\"entry-title\">Title</h1>\
             <time class=\"entry-date\">{date}</time>\
             <div class=\"entry-content\"><p>Body.</p></div></body></html>"
        )
    }

    #[tokio::test]
    async fn test_discover_descends_only_matching_sitemaps() {
        let posts = r#"<urlset>
  <url><loc>https://news.test/a/</loc><lastmod>2025-09-25</lastmod></url>
</urlset>"#;
        let fetcher = StubFetcher::new(vec![
            ("https://news.test/wp-sitemap.xml", INDEX.to_string()),
            (
                "https://news.test/wp-sitemap-posts-post-1.xml",
                posts.to_string(),
            ),
        ]);
        let profile = test_profile();
        let stats = CrawlStats::new();

        let entries = discover(&fetcher, &profile, &stats).await.unwrap();
        assert_eq!(entries, vec![entry("https://news.test/a/", Some("2025-09-25"))]);
        assert!(!fetcher.requested("https://news.test/wp-sitemap-users-1.xml"));
        assert_eq!(stats.pages_fetched(), 2);
    }

    #[tokio::test]
    async fn test_run_emits_only_in_window_articles() {
        let posts = r#"<urlset>
  <url><loc>https://news.test/a/</loc><lastmod>2025-09-25</lastmod></url>
  <url><loc>https://news.test/b/</loc><lastmod>2025-09-10</lastmod></url>
  <url><loc>https://news.test/c/</loc><lastmod>2025-09-26</lastmod></url>
</urlset>"#;
        let fetcher = StubFetcher::new(vec![
            ("https://news.test/wp-sitemap.xml", INDEX.to_string()),
            (
                "https://news.test/wp-sitemap-posts-post-1.xml",
                posts.to_string(),
            ),
            ("https://news.test/a/", article_page("2025-09-25")),
            // entry lastmod passes but the page itself is dated outside
            ("https://news.test/c/", article_page("2025-09-30")),
        ]);
        let profile = test_profile();
        let window = window(Some((2025, 9, 22)), Some((2025, 9, 28)));
        let stats = CrawlStats::new();

        let records = run(&fetcher, &profile, &window, &stats).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://news.test/a/");
        assert_eq!(
            records[0].published_date,
            Some(crate::models::PublishedDate::Parsed(
                NaiveDate::from_ymd_opt(2025, 9, 25).unwrap()
            ))
        );
        // b was filtered at the entry level and never fetched
        assert!(!fetcher.requested("https://news.test/b/"));
        assert_eq!(stats.entries_passed(), 2);
        assert_eq!(stats.entries_filtered(), 1);
        assert_eq!(stats.articles_found(), 1);
        assert_eq!(stats.articles_skipped(), 1);
    }
}
