//! Minimality rules: trailing sentences and bracketed remarks.

use regex::Regex;
use std::ops::Range;

use super::highlight::{marker, wrap_ranges};
use super::RuleContext;
use crate::analysis::tagger::TaggerResult;
use crate::model::defect::{DefectCandidate, DefectSubkind, Severity};
use crate::model::story::Story;

pub(super) fn punctuation(
    story: &Story,
    context: &RuleContext<'_>,
) -> TaggerResult<Option<DefectCandidate>> {
    let text = story.text.as_str();
    let marks = &context.lexicon.punctuation;
    let continues_after_mark = marks.iter().any(|mark| {
        Regex::new(&format!(r"{} .", regex::escape(mark)))
            .is_ok_and(|pattern| pattern.is_match(text))
    });
    if !continues_after_mark {
        return Ok(None);
    }

    let Some(first) = marks.iter().filter_map(|mark| text.find(mark.as_str())).min() else {
        return Ok(None);
    };
    let severity = Severity::High;
    let highlight = format!("{}{}", &text[..first], marker(&text[first..], severity));
    Ok(Some(DefectCandidate::new(
        DefectSubkind::Punctuation,
        severity,
        highlight,
    )))
}

pub(super) fn brackets(
    story: &Story,
    context: &RuleContext<'_>,
) -> TaggerResult<Option<DefectCandidate>> {
    let text = story.text.as_str();
    let pairs = &context.lexicon.brackets;
    let has_remark = pairs.iter().any(|[open, close]| {
        let pattern = format!(
            r"{}.+{}(?:\W|$)",
            regex::escape(&open.to_string()),
            regex::escape(&close.to_string())
        );
        Regex::new(&pattern).is_ok_and(|pattern| pattern.is_match(text))
    });
    if !has_remark {
        return Ok(None);
    }

    let mut ranges = Vec::new();
    for [open, close] in pairs {
        let Some(mut pair_ranges) = bracket_ranges(text, *open, *close) else {
            return Ok(None);
        };
        ranges.append(&mut pair_ranges);
    }
    let severity = Severity::High;
    Ok(wrap_ranges(text, ranges, severity)
        .map(|highlight| DefectCandidate::new(DefectSubkind::Brackets, severity, highlight)))
}

/// For each closing bracket, the range from the last opening bracket since
/// the previous closing bracket through the closing one.
///
/// `None` when some closing bracket has no opening bracket in its segment.
fn bracket_ranges(text: &str, open: char, close: char) -> Option<Vec<Range<usize>>> {
    let mut ranges = Vec::new();
    let mut last_open: Option<usize> = None;
    for (index, ch) in text.char_indices() {
        if ch == open {
            last_open = Some(index);
        } else if ch == close {
            let start = last_open.take()?;
            ranges.push(start..index + ch.len_utf8());
        }
    }
    Some(ranges)
}

#[cfg(test)]
mod tests {
    use super::bracket_ranges;

    #[test]
    fn pairs_last_opening_with_next_closing() {
        assert_eq!(bracket_ranges("a ((b) c (d)", '(', ')'), Some(vec![3..6, 9..12]));
    }

    #[test]
    fn stray_closing_bracket_fails() {
        assert_eq!(bracket_ranges("a) (b)", '(', ')'), None);
        assert_eq!(bracket_ranges("no brackets", '(', ')'), Some(Vec::new()));
    }
}
