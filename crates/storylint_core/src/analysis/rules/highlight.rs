//! Highlight markup helpers.

use std::ops::Range;

use crate::model::defect::Severity;

/// Wraps `text` in the highlight marker for `severity`.
pub fn marker(text: &str, severity: Severity) -> String {
    format!("<span class=\"highlight-text severity-{severity}\">{text}</span>")
}

/// Wraps every byte range of `text` in a marker.
///
/// Ranges are applied from the last to the first so earlier offsets stay
/// valid. Overlapping ranges keep the earliest one. Returns `None` when a
/// range is out of bounds or splits a character.
pub fn wrap_ranges(text: &str, mut ranges: Vec<Range<usize>>, severity: Severity) -> Option<String> {
    ranges.sort_by_key(|range| (range.start, range.end));
    let mut disjoint: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        if disjoint.last().is_some_and(|previous| range.start < previous.end) {
            continue;
        }
        disjoint.push(range);
    }

    let mut highlighted = text.to_string();
    for range in disjoint.into_iter().rev() {
        let word = text.get(range.clone())?;
        highlighted.replace_range(range, &marker(word, severity));
    }
    Some(highlighted)
}

/// Byte range of the first case-insensitive occurrence of `needle`.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.is_empty() {
        return None;
    }
    let pattern = regex::RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
        .ok()?;
    pattern.find(haystack).map(|found| found.range())
}

#[cfg(test)]
mod tests {
    use super::{find_case_insensitive, marker, wrap_ranges};
    use crate::model::defect::Severity;

    #[test]
    fn marker_uses_severity_class() {
        assert_eq!(
            marker(",", Severity::Minor),
            "<span class=\"highlight-text severity-minor\">,</span>"
        );
    }

    #[test]
    fn wraps_in_descending_order() {
        let highlighted = wrap_ranges("a and b or c", vec![2..5, 8..10], Severity::High)
            .expect("ranges are valid");
        assert_eq!(
            highlighted,
            "a <span class=\"highlight-text severity-high\">and</span> b \
             <span class=\"highlight-text severity-high\">or</span> c"
        );
    }

    #[test]
    fn rejects_out_of_bounds_ranges() {
        assert_eq!(wrap_ranges("abc", vec![2..9], Severity::High), None);
    }

    #[test]
    fn finds_without_case() {
        assert_eq!(find_case_insensitive("Sell AND buy", " and "), Some(4..9));
        assert_eq!(find_case_insensitive("Sell", ""), None);
    }
}
