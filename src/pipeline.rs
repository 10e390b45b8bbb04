//! Post-extraction normalization.
//!
//! Applied once per record before it reaches the output sink: collapse
//! whitespace runs in the body text and de-duplicate the URL lists
//! while preserving first-occurrence order. The pass is idempotent, so
//! running it twice changes nothing.

use crate::models::ArticleRecord;
use itertools::Itertools;

/// Replace every run of whitespace with a single space and strip the
/// ends. Falls out of the split/join strategy rather than being a
/// separate trimming step.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep each distinct value once, at the position of its first
/// occurrence. Equality is exact string match; URLs differing only in
/// case or encoding stay distinct.
pub fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    values.into_iter().unique().collect()
}

/// Normalize a record: collapsed body text, de-duplicated URL lists.
/// Empty lists pass through empty.
pub fn normalize(record: ArticleRecord) -> ArticleRecord {
    ArticleRecord {
        text: collapse_whitespace(&record.text),
        images: dedup_preserving_order(record.images),
        videos: dedup_preserving_order(record.videos),
        links: dedup_preserving_order(record.links),
        ..record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_collapse_whitespace_squeezes_runs() {
        assert_eq!(collapse_whitespace("a  b\t\nc"), "a b c");
        assert_eq!(collapse_whitespace("  padded  "), "padded");
        assert_eq!(collapse_whitespace(""), "");
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_position() {
        assert_eq!(
            dedup_preserving_order(strings(&["a", "b", "a", "c", "b"])),
            strings(&["a", "b", "c"])
        );
    }

    #[test]
    fn test_dedup_is_exact_match_only() {
        let values = strings(&["https://a.ma/x", "https://A.MA/x", "https://a.ma/x/"]);
        assert_eq!(dedup_preserving_order(values.clone()), values);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let record = ArticleRecord {
            id: "post".to_string(),
            title: "t".to_string(),
            published_date: None,
            author: String::new(),
            text: "  one \n two   three ".to_string(),
            images: strings(&["a", "a", "b"]),
            videos: Vec::new(),
            links: strings(&["x", "y", "x"]),
            url: "https://thevoice.ma/post".to_string(),
        };

        let once = normalize(record);
        assert_eq!(once.text, "one two three");
        assert_eq!(once.images, strings(&["a", "b"]));
        assert!(once.videos.is_empty());
        assert_eq!(once.links, strings(&["x", "y"]));

        let twice = normalize(once.clone());
        assert_eq!(twice.text, once.text);
        assert_eq!(twice.images, once.images);
        assert_eq!(twice.links, once.links);
    }
}
