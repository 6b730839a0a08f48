//! Uniformity rule: stories follow the project template.

use super::RuleContext;
use crate::analysis::tagger::TaggerResult;
use crate::model::defect::{DefectCandidate, DefectSubkind, Severity};
use crate::model::story::{ChunkKind, Story};

pub(super) fn uniform(
    story: &Story,
    context: &RuleContext<'_>,
) -> TaggerResult<Option<DefectCandidate>> {
    let facts = context.facts;
    if facts.story_count <= context.settings.min_stories {
        return Ok(None);
    }

    let deviates = ChunkKind::ALL.into_iter().any(|kind| {
        context
            .detector
            .extract_indicator_phrase(story.chunk(kind), kind)
            .is_some_and(|phrase| {
                let expected = facts.format.phrase(kind).to_lowercase();
                edit_distance(&phrase.to_lowercase(), &expected) > context.settings.max_edit_distance
            })
    });
    if !deviates {
        return Ok(None);
    }
    Ok(Some(DefectCandidate::new(
        DefectSubkind::Uniform,
        Severity::Medium,
        format!("Use the most common template: {}", facts.format),
    )))
}

/// Levenshtein distance over characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];
    for (i, a_char) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::edit_distance;

    #[test]
    fn edit_distance_counts_single_edits() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("so that", "so that"), 0);
    }

    #[test]
    fn template_phrases_far_apart() {
        assert_eq!(edit_distance("i want to", "i'm able to"), 6);
        assert!(edit_distance("i am able to", "i'm able to") <= 3);
    }
}
