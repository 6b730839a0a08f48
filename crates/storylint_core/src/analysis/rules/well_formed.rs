//! Well-formedness rules: required chunks and separating commas.

use super::highlight::marker;
use super::RuleContext;
use crate::analysis::tagger::TaggerResult;
use crate::model::defect::{DefectCandidate, DefectSubkind, Severity};
use crate::model::story::Story;

pub(super) fn no_means(
    story: &Story,
    _context: &RuleContext<'_>,
) -> TaggerResult<Option<DefectCandidate>> {
    Ok(story
        .chunks
        .means
        .is_none()
        .then(|| DefectCandidate::new(DefectSubkind::NoMeans, Severity::High, "Add a means")))
}

pub(super) fn no_role(
    story: &Story,
    _context: &RuleContext<'_>,
) -> TaggerResult<Option<DefectCandidate>> {
    Ok(story
        .chunks
        .role
        .is_none()
        .then(|| DefectCandidate::new(DefectSubkind::NoRole, Severity::High, "Add a role")))
}

pub(super) fn no_means_comma(
    story: &Story,
    _context: &RuleContext<'_>,
) -> TaggerResult<Option<DefectCandidate>> {
    Ok(missing_comma(
        story.chunks.role.as_deref(),
        story.chunks.means.as_deref(),
        DefectSubkind::NoMeansComma,
    ))
}

pub(super) fn no_ends_comma(
    story: &Story,
    _context: &RuleContext<'_>,
) -> TaggerResult<Option<DefectCandidate>> {
    Ok(missing_comma(
        story.chunks.means.as_deref(),
        story.chunks.ends.as_deref(),
        DefectSubkind::NoEndsComma,
    ))
}

/// Candidate when `head` lacks the comma that should separate it from `tail`.
fn missing_comma(
    head: Option<&str>,
    tail: Option<&str>,
    subkind: DefectSubkind,
) -> Option<DefectCandidate> {
    let (head, tail) = (head?, tail?);
    if head.contains(',') {
        return None;
    }
    let severity = Severity::Minor;
    let highlight = format!("{head}{} {tail}", marker(",", severity));
    Some(DefectCandidate::new(subkind, severity, highlight))
}

#[cfg(test)]
mod tests {
    use super::missing_comma;
    use crate::model::defect::{DefectSubkind, Severity};

    #[test]
    fn comma_rule_highlights_insertion_point() {
        let candidate = missing_comma(
            Some("As a User"),
            Some("I want to sell"),
            DefectSubkind::NoMeansComma,
        )
        .expect("role lacks a comma");
        assert_eq!(candidate.severity, Severity::Minor);
        assert_eq!(
            candidate.highlight,
            "As a User<span class=\"highlight-text severity-minor\">,</span> I want to sell"
        );
    }

    #[test]
    fn comma_rule_needs_both_chunks() {
        assert!(missing_comma(None, Some("I want to"), DefectSubkind::NoMeansComma).is_none());
        assert!(missing_comma(Some("As a User,"), Some("I"), DefectSubkind::NoMeansComma).is_none());
    }
}
