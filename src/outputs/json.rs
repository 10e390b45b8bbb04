//! JSON feed output.
//!
//! This module serializes the crawled articles to a single JSON feed
//! for consumption by downstream indexing and archival jobs.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── articles.json
//! ```
//!
//! The feed is a JSON array of article records in crawl order, with
//! camelCase keys (`publishedDate`, not `published_date`).

use crate::models::ArticleRecord;
use std::error::Error;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write the article feed to `{output_dir}/articles.json`.
///
/// Creates the output directory if needed and writes the serialized
/// records as one JSON array.
///
/// # Arguments
///
/// * `records` - The normalized articles to serialize
/// * `output_dir` - Base directory for the feed file
///
/// # Returns
///
/// `Ok(())` on success, or an error if directory creation, serialization,
/// or file writing fails.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_feed(records: &[ArticleRecord], output_dir: &str) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string(records)?;

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(%output_dir, error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let feed_path = format!("{}/articles.json", output_dir.trim_end_matches('/'));
    info!(path = %feed_path, count = records.len(), "Writing JSON feed");
    fs::write(&feed_path, json).await?;
    info!(path = %feed_path, "Wrote JSON feed");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublishedDate;
    use chrono::NaiveDate;

    fn record(id: &str) -> ArticleRecord {
        ArticleRecord {
            id: id.to_string(),
            title: "عنوان".to_string(),
            published_date: Some(PublishedDate::Parsed(
                NaiveDate::from_ymd_opt(2025, 9, 28).unwrap(),
            )),
            author: String::new(),
            text: "نص المقال".to_string(),
            images: vec!["https://news.test/img.jpg".to_string()],
            videos: Vec::new(),
            links: Vec::new(),
            url: format!("https://news.test/{id}/"),
        }
    }

    #[tokio::test]
    async fn test_write_feed_creates_articles_json() {
        let dir = std::env::temp_dir().join("jarida_test_feed");
        let _ = std::fs::remove_dir_all(&dir);
        let dir_str = dir.to_str().unwrap();

        write_feed(&[record("a"), record("b")], dir_str).await.unwrap();

        let raw = std::fs::read_to_string(dir.join("articles.json")).unwrap();
        assert!(raw.starts_with('['));
        assert!(raw.contains("\"publishedDate\":\"2025-09-28\""));
        assert!(raw.contains("https://news.test/a/"));
        assert!(raw.contains("https://news.test/b/"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_write_feed_empty_run_writes_empty_array() {
        let dir = std::env::temp_dir().join("jarida_test_feed_empty");
        let _ = std::fs::remove_dir_all(&dir);
        let dir_str = dir.to_str().unwrap();

        write_feed(&[], dir_str).await.unwrap();

        let raw = std::fs::read_to_string(dir.join("articles.json")).unwrap();
        assert_eq!(raw, "[]");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
