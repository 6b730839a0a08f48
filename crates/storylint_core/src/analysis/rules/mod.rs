//! Defect rule engine.
//!
//! # Responsibility
//! - Hold the static, ordered rule table.
//! - Evaluate rules for one story against explicit project facts.
//!
//! # Invariants
//! - Rules are pure: no storage access, no mutation of the story.
//! - Each rule yields at most one candidate per story.
//! - A rule whose highlight cannot be built yields nothing.

use serde::{Deserialize, Serialize};

use crate::analysis::lexicon::Lexicon;
use crate::analysis::matcher::ShallowParser;
use crate::analysis::phrase::PhraseDetector;
use crate::analysis::tagger::TaggerResult;
use crate::model::defect::{DefectCandidate, DefectKind, DefectScope, DefectSubkind};
use crate::model::project::ProjectFormat;
use crate::model::story::Story;

mod atomic;
pub mod highlight;
mod minimal;
mod uniform;
mod unique;
mod well_formed;

pub use uniform::edit_distance;

/// Thresholds for the uniformity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    /// Uniformity applies only when a project has more stories than this.
    pub min_stories: usize,
    /// Largest tolerated edit distance to the project format phrase.
    pub max_edit_distance: usize,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            min_stories: 3,
            max_edit_distance: 3,
        }
    }
}

/// Project-level facts a story is judged against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFacts {
    pub format: ProjectFormat,
    pub story_count: usize,
    /// Other stories of the project with byte-identical text.
    pub identical_stories: usize,
}

/// Everything a rule may read.
pub struct RuleContext<'a> {
    pub lexicon: &'a Lexicon,
    pub detector: &'a PhraseDetector,
    pub parser: &'a ShallowParser,
    pub settings: &'a RuleSettings,
    pub facts: &'a ProjectFacts,
}

type RuleCheck = fn(&Story, &RuleContext<'_>) -> TaggerResult<Option<DefectCandidate>>;

/// One entry of the rule table.
pub struct Rule {
    pub subkind: DefectSubkind,
    check: RuleCheck,
}

impl Rule {
    pub fn kind(&self) -> DefectKind {
        self.subkind.kind()
    }

    pub fn evaluate(
        &self,
        story: &Story,
        context: &RuleContext<'_>,
    ) -> TaggerResult<Option<DefectCandidate>> {
        (self.check)(story, context)
    }
}

/// Rule table in evaluation order.
pub static RULES: [Rule; 9] = [
    Rule {
        subkind: DefectSubkind::NoMeans,
        check: well_formed::no_means,
    },
    Rule {
        subkind: DefectSubkind::NoRole,
        check: well_formed::no_role,
    },
    Rule {
        subkind: DefectSubkind::NoMeansComma,
        check: well_formed::no_means_comma,
    },
    Rule {
        subkind: DefectSubkind::NoEndsComma,
        check: well_formed::no_ends_comma,
    },
    Rule {
        subkind: DefectSubkind::Conjunctions,
        check: atomic::conjunctions,
    },
    Rule {
        subkind: DefectSubkind::Identical,
        check: unique::identical,
    },
    Rule {
        subkind: DefectSubkind::Punctuation,
        check: minimal::punctuation,
    },
    Rule {
        subkind: DefectSubkind::Brackets,
        check: minimal::brackets,
    },
    Rule {
        subkind: DefectSubkind::Uniform,
        check: uniform::uniform,
    },
];

/// Runs every rule in `scope` and collects the candidates in table order.
pub fn evaluate(
    story: &Story,
    context: &RuleContext<'_>,
    scope: DefectScope,
) -> TaggerResult<Vec<DefectCandidate>> {
    let mut candidates = Vec::new();
    for rule in RULES.iter().filter(|rule| scope.includes(rule.kind())) {
        if let Some(candidate) = rule.evaluate(story, context)? {
            candidates.push(candidate);
        }
    }
    Ok(candidates)
}
