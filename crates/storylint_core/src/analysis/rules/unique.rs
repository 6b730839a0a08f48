//! Uniqueness rule: no byte-identical stories within a project.

use super::RuleContext;
use crate::analysis::tagger::TaggerResult;
use crate::model::defect::{DefectCandidate, DefectSubkind, Severity};
use crate::model::story::Story;

pub(super) fn identical(
    _story: &Story,
    context: &RuleContext<'_>,
) -> TaggerResult<Option<DefectCandidate>> {
    Ok((context.facts.identical_stories > 0).then(|| {
        DefectCandidate::new(
            DefectSubkind::Identical,
            Severity::High,
            "Remove all duplicate user stories",
        )
    }))
}
