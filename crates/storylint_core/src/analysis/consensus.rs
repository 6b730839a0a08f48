//! Format consensus.
//!
//! # Responsibility
//! - Derive a project's canonical template from its stories' chunks.
//!
//! # Invariants
//! - Ties go to the phrase seen first in story order.
//! - A position without any phrase takes the default template phrase.

use std::collections::HashMap;

use crate::analysis::phrase::PhraseDetector;
use crate::model::project::ProjectFormat;
use crate::model::story::{ChunkKind, Story};

/// Most frequent indicator phrase per chunk position across `stories`.
pub fn compute_format<'a>(
    detector: &PhraseDetector,
    stories: impl IntoIterator<Item = &'a Story>,
) -> ProjectFormat {
    let mut tallies: [PhraseTally; 3] = Default::default();
    for story in stories {
        for kind in ChunkKind::ALL {
            if let Some(phrase) = detector.extract_indicator_phrase(story.chunk(kind), kind) {
                tallies[kind.position()].add(phrase);
            }
        }
    }

    let defaults = ProjectFormat::default();
    let [role, means, ends] = ChunkKind::ALL.map(|kind| {
        tallies[kind.position()]
            .most_common()
            .unwrap_or_else(|| defaults.phrase(kind).to_string())
    });
    ProjectFormat::new(role, means, ends)
}

#[derive(Debug, Default)]
struct PhraseTally {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl PhraseTally {
    fn add(&mut self, phrase: String) {
        let count = self.counts.entry(phrase.clone()).or_insert(0);
        if *count == 0 {
            self.order.push(phrase);
        }
        *count += 1;
    }

    fn most_common(&self) -> Option<String> {
        let mut best: Option<(&String, usize)> = None;
        for phrase in &self.order {
            let count = self.counts.get(phrase).copied().unwrap_or(0);
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((phrase, count));
            }
        }
        best.map(|(phrase, _)| phrase.clone())
    }
}
