//! Atomicity rule: one requirement per story.

use regex::RegexBuilder;

use super::highlight::{find_case_insensitive, wrap_ranges};
use super::RuleContext;
use crate::analysis::tagger::TaggerResult;
use crate::model::defect::{DefectCandidate, DefectSubkind, Severity};
use crate::model::story::{ChunkKind, Story};

pub(super) fn conjunctions(
    story: &Story,
    context: &RuleContext<'_>,
) -> TaggerResult<Option<DefectCandidate>> {
    let mut compound = false;
    for kind in ChunkKind::ALL {
        let Some(chunk) = story.chunk(kind) else {
            continue;
        };
        if joins_several_clauses(chunk, kind, context)? {
            compound = true;
            break;
        }
    }
    if !compound {
        return Ok(None);
    }

    let severity = Severity::High;
    let ranges = context
        .lexicon
        .conjunctions
        .iter()
        .filter_map(|conjunction| find_case_insensitive(&story.text, conjunction))
        .collect();
    Ok(wrap_ranges(&story.text, ranges, severity)
        .map(|highlight| DefectCandidate::new(DefectSubkind::Conjunctions, severity, highlight)))
}

/// Whether more than one conjunction-separated segment holds its own clause.
fn joins_several_clauses(
    chunk: &str,
    kind: ChunkKind,
    context: &RuleContext<'_>,
) -> TaggerResult<bool> {
    let (parse_as, label) = match kind {
        ChunkKind::Role => (ChunkKind::Role, "NP"),
        ChunkKind::Means | ChunkKind::Ends => (ChunkKind::Means, "MEANS"),
    };

    let mut clauses = 0;
    for conjunction in &context.lexicon.conjunctions {
        let Ok(splitter) = RegexBuilder::new(&regex::escape(conjunction))
            .case_insensitive(true)
            .build()
        else {
            continue;
        };
        if !splitter.is_match(chunk) {
            continue;
        }
        for segment in splitter.split(chunk) {
            if !context
                .parser
                .well_formed_content_rule(segment, parse_as, &[label])?
            {
                clauses += 1;
            }
        }
    }
    Ok(clauses > 1)
}
