//! Similarity scoring and gating for raw diffs.
//!
//! The score is measured on the merged tree's serialization before any
//! structural cleanup, so tag overhead counts toward both numerator and
//! denominator. The published threshold semantics are approximate; the
//! regression scenarios pin the exact behavior.

use regex::Regex;
use std::sync::LazyLock;

static DEL_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<del.*?del>").expect("static pattern"));
static INS_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<ins.*?ins>").expect("static pattern"));

/// Fraction of the serialized diff unaffected by deletion/insertion regions.
///
/// An empty diff counts as fully similar.
pub fn score(markup: &str) -> f64 {
    if markup.is_empty() {
        return 1.0;
    }
    let stripped = DEL_REGION.replace_all(markup, "");
    let stripped = INS_REGION.replace_all(&stripped, "");
    stripped.len() as f64 / markup.len() as f64
}

/// Rounded percentage of changed content, for the gate diagnostic.
pub fn changed_percent(similarity: f64) -> u32 {
    (100.0 - similarity * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_content_scores_one() {
        assert_eq!(score("<p>nothing changed</p>"), 1.0);
        assert_eq!(score(""), 1.0);
    }

    #[test]
    fn fully_annotated_content_scores_near_zero() {
        let s = score("<del>all old</del><ins>all new</ins>");
        assert!(s < 0.01, "score was {s}");
    }

    #[test]
    fn score_is_monotone_in_annotated_length() {
        // Same total length, strictly more content annotated in the second.
        let less = "<p>aaaa <del>b</del>bbb</p>";
        let more = "<p>aaaa <del>bbbb</del></p>";
        assert_eq!(less.len(), more.len());
        assert!(score(more) < score(less));
    }

    #[test]
    fn multiline_regions_are_stripped() {
        let s = score("<p>keep</p><del>old\nlines</del>");
        assert!(s < 1.0);
        assert!(s > 0.0);
    }

    #[test]
    fn changed_percent_rounds() {
        assert_eq!(changed_percent(1.0), 0);
        assert_eq!(changed_percent(0.349), 65);
        assert_eq!(changed_percent(0.0), 100);
    }
}
