//! Site profile: where to crawl and how to find each field.
//!
//! A [`SiteProfile`] bundles everything markup-specific about the target
//! site: the category listing URL, the sitemap index URL, the regex
//! patterns that select which nested sitemaps to descend into, the
//! category-path substring that marks listing links, and the ordered
//! extraction rule chains for every article and listing field.
//!
//! The built-in default profile targets `thevoice.ma`. Passing
//! `--config profile.yaml` swaps in a YAML file with the same shape,
//! which is how the crawler follows the site through theme changes
//! without a rebuild.
//!
//! Profiles are compiled once at startup ([`SiteProfile::compile`]):
//! selector strings become [`scraper::Selector`]s and pattern strings
//! become [`regex::Regex`]es, so a typo fails the run before the first
//! request, with the offending string named in the error.

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::error::Error;
use tracing::info;
use url::Url;

/// One extraction rule: a CSS selector plus an optional attribute name.
///
/// With `attr` set, the rule yields that attribute's value from each
/// matched element; without it, the rule yields the element's text
/// content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRule {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

impl ExtractRule {
    /// Rule over element text content.
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attr: None,
        }
    }

    /// Rule over an attribute value.
    pub fn attr(selector: &str, attr: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attr: Some(attr.to_string()),
        }
    }
}

/// Ordered rule chains for every article field. First non-empty rule wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRules {
    pub title: Vec<ExtractRule>,
    pub date: Vec<ExtractRule>,
    pub author: Vec<ExtractRule>,
    pub body: Vec<ExtractRule>,
    pub images: Vec<ExtractRule>,
    pub videos: Vec<ExtractRule>,
    pub links: Vec<ExtractRule>,
}

/// Rule chains for category listing pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRules {
    /// Candidates for article links; the first yielding any link wins.
    pub articles: Vec<ExtractRule>,
    /// Candidates for the next-page link.
    pub next_page: Vec<ExtractRule>,
}

/// Everything markup- and URL-specific about one news site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Category listing page the pagination crawl starts from.
    pub listing_url: String,
    /// Root sitemap index the sitemap crawl starts from.
    pub sitemap_url: String,
    /// Regex patterns selecting nested sitemaps to descend into.
    /// An empty list descends into every nested sitemap.
    #[serde(default)]
    pub sitemap_patterns: Vec<String>,
    /// Links containing this substring are listing pages, not articles.
    pub category_path: String,
    pub listing: ListingRules,
    pub article: FieldRules,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            listing_url: "https://thevoice.ma/category/societe/".to_string(),
            sitemap_url: "https://thevoice.ma/wp-sitemap.xml".to_string(),
            sitemap_patterns: vec!["wp-sitemap-posts".to_string()],
            category_path: "/category/".to_string(),
            listing: ListingRules {
                articles: vec![
                    ExtractRule::attr("h2.entry-title a", "href"),
                    ExtractRule::attr("h2.title a", "href"),
                    ExtractRule::attr("h2 a", "href"),
                    ExtractRule::attr("a.entry-title-link", "href"),
                    ExtractRule::attr("div.post-item a", "href"),
                ],
                next_page: vec![
                    ExtractRule::attr("a.next", "href"),
                    ExtractRule::attr("a.next.page-numbers", "href"),
                    ExtractRule::attr("li.pagination-next a", "href"),
                    ExtractRule::attr("a[rel=\"next\"]", "href"),
                ],
            },
            article: FieldRules {
                title: vec![
                    ExtractRule::text("h1.entry-title"),
                    ExtractRule::text("h1.title"),
                    ExtractRule::text("h1"),
                    ExtractRule::text("header h1"),
                    ExtractRule::text("h1.article-title"),
                ],
                date: vec![
                    ExtractRule::text("time.entry-date"),
                    ExtractRule::text("time.item-date"),
                    ExtractRule::text("span.date"),
                    ExtractRule::text("div.date"),
                    ExtractRule::text(".post-date"),
                    ExtractRule::text(".article-date"),
                    ExtractRule::attr("meta[property=\"article:published_time\"]", "content"),
                ],
                author: vec![
                    ExtractRule::text("span.author-name a"),
                    ExtractRule::text(".author-box .author-name"),
                    ExtractRule::text(".author-data .author-name"),
                    ExtractRule::text(".author-box-content .author-name a"),
                    ExtractRule::text("span.author-name"),
                    ExtractRule::text(".post-author a"),
                    ExtractRule::text("a[rel=\"author\"]"),
                    ExtractRule::text("span.byline a"),
                    ExtractRule::text("div.author a"),
                    // Last resort: whatever the page metadata claims.
                    ExtractRule::attr("meta[name=\"author\"]", "content"),
                ],
                body: vec![
                    ExtractRule::text("div.entry-content p"),
                    ExtractRule::text("div#item-content p"),
                    ExtractRule::text("div.post-content p"),
                    ExtractRule::text("article p"),
                    ExtractRule::text("div.content p"),
                ],
                images: vec![
                    ExtractRule::attr("div.entry-content img", "src"),
                    ExtractRule::attr("img.wp-post-image", "src"),
                    ExtractRule::attr("figure img", "src"),
                    ExtractRule::attr("div.article-image img", "src"),
                    ExtractRule::attr("article img", "src"),
                ],
                videos: vec![
                    ExtractRule::attr("div.entry-content iframe", "src"),
                    ExtractRule::attr("div.entry-content video source", "src"),
                    ExtractRule::attr("figure.wp-block-embed iframe", "src"),
                ],
                links: vec![ExtractRule::attr("div.entry-content a", "href")],
            },
        }
    }
}

/// Load a profile from a YAML file, or fall back to the built-in default.
pub fn load_profile(path: Option<&str>) -> Result<SiteProfile, Box<dyn Error>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let profile: SiteProfile = serde_yaml::from_str(&raw)?;
            info!(path, "Loaded site profile");
            Ok(profile)
        }
        None => Ok(SiteProfile::default()),
    }
}

/// A rule whose selector has been parsed. `source` keeps the original
/// selector string for log lines.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub selector: Selector,
    pub attr: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct CompiledFieldRules {
    pub title: Vec<CompiledRule>,
    pub date: Vec<CompiledRule>,
    pub author: Vec<CompiledRule>,
    pub body: Vec<CompiledRule>,
    pub images: Vec<CompiledRule>,
    pub videos: Vec<CompiledRule>,
    pub links: Vec<CompiledRule>,
}

#[derive(Debug, Clone)]
pub struct CompiledListingRules {
    pub articles: Vec<CompiledRule>,
    pub next_page: Vec<CompiledRule>,
}

/// A [`SiteProfile`] with URLs parsed, selectors compiled, and sitemap
/// patterns built. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    pub listing_url: Url,
    pub sitemap_url: Url,
    pub sitemap_patterns: Vec<Regex>,
    pub category_path: String,
    pub listing: CompiledListingRules,
    pub article: CompiledFieldRules,
}

fn compile_rule(rule: &ExtractRule) -> Result<CompiledRule, Box<dyn Error>> {
    let selector = Selector::parse(&rule.selector)
        .map_err(|e| format!("invalid selector `{}`: {e}", rule.selector))?;
    Ok(CompiledRule {
        selector,
        attr: rule.attr.clone(),
        source: rule.selector.clone(),
    })
}

fn compile_chain(rules: &[ExtractRule]) -> Result<Vec<CompiledRule>, Box<dyn Error>> {
    rules.iter().map(compile_rule).collect()
}

impl SiteProfile {
    /// Validate and compile the profile. Any bad selector, pattern, or
    /// URL fails here, before the first request goes out.
    pub fn compile(&self) -> Result<CompiledProfile, Box<dyn Error>> {
        let sitemap_patterns = self
            .sitemap_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| format!("invalid sitemap pattern `{pattern}`: {e}").into())
            })
            .collect::<Result<Vec<_>, Box<dyn Error>>>()?;

        Ok(CompiledProfile {
            listing_url: Url::parse(&self.listing_url)?,
            sitemap_url: Url::parse(&self.sitemap_url)?,
            sitemap_patterns,
            category_path: self.category_path.clone(),
            listing: CompiledListingRules {
                articles: compile_chain(&self.listing.articles)?,
                next_page: compile_chain(&self.listing.next_page)?,
            },
            article: CompiledFieldRules {
                title: compile_chain(&self.article.title)?,
                date: compile_chain(&self.article.date)?,
                author: compile_chain(&self.article.author)?,
                body: compile_chain(&self.article.body)?,
                images: compile_chain(&self.article.images)?,
                videos: compile_chain(&self.article.videos)?,
                links: compile_chain(&self.article.links)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_compiles() {
        let compiled = SiteProfile::default().compile().unwrap();
        assert_eq!(compiled.listing_url.host_str(), Some("thevoice.ma"));
        assert_eq!(compiled.article.date.len(), 7);
        assert_eq!(compiled.sitemap_patterns.len(), 1);
        assert!(compiled.sitemap_patterns[0].is_match("wp-sitemap-posts-post-1.xml"));
    }

    #[test]
    fn test_author_chain_ends_with_meta_fallback() {
        let profile = SiteProfile::default();
        let last = profile.article.author.last().unwrap();
        assert_eq!(last.selector, "meta[name=\"author\"]");
        assert_eq!(last.attr.as_deref(), Some("content"));
    }

    #[test]
    fn test_bad_selector_is_rejected_by_name() {
        let mut profile = SiteProfile::default();
        profile.article.title.push(ExtractRule::text("h1[["));
        let err = profile.compile().unwrap_err().to_string();
        assert!(err.contains("h1[["));
    }

    #[test]
    fn test_bad_pattern_is_rejected_by_name() {
        let mut profile = SiteProfile::default();
        profile.sitemap_patterns.push("(unclosed".to_string());
        let err = profile.compile().unwrap_err().to_string();
        assert!(err.contains("(unclosed"));
    }

    #[test]
    fn test_profile_yaml_round_trip() {
        let yaml = serde_yaml::to_string(&SiteProfile::default()).unwrap();
        let parsed: SiteProfile = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.listing_url, SiteProfile::default().listing_url);
        assert_eq!(parsed.article.author.len(), 10);
        parsed.compile().unwrap();
    }

    #[test]
    fn test_partial_yaml_defaults_patterns_empty() {
        let yaml = r#"
listing_url: "https://example.ma/category/news/"
sitemap_url: "https://example.ma/sitemap.xml"
category_path: "/category/"
listing:
  articles:
    - selector: "h2 a"
      attr: "href"
  next_page:
    - selector: "a.next"
      attr: "href"
article:
  title: [{ selector: "h1" }]
  date: [{ selector: "time" }]
  author: [{ selector: ".byline" }]
  body: [{ selector: "article p" }]
  images: [{ selector: "article img", attr: "src" }]
  videos: []
  links: [{ selector: "article a", attr: "href" }]
"#;
        let profile: SiteProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.sitemap_patterns.is_empty());
        profile.compile().unwrap();
    }
}
