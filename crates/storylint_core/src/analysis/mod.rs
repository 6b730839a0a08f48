//! Pure story analysis core.
//!
//! # Responsibility
//! - Chunk story text and evaluate defect rules.
//! - Compute project format consensus.
//!
//! # Invariants
//! - Nothing in this module touches storage.
//! - The lexicon is fixed for the lifetime of an [`Analyzer`].

pub mod chunker;
pub mod consensus;
pub mod grammar;
pub mod lexicon;
pub mod matcher;
pub mod phrase;
pub mod rules;
pub mod tagger;

use crate::model::defect::{DefectCandidate, DefectScope};
use crate::model::project::ProjectFormat;
use crate::model::story::{Chunks, Story};
use chunker::StoryChunker;
use lexicon::{Lexicon, LexiconError};
use matcher::ShallowParser;
use phrase::PhraseDetector;
use rules::{ProjectFacts, RuleContext, RuleSettings};
use tagger::{RuleTagger, Tagger, TaggerResult};

/// Lexicon, tagger and rule settings bound together.
pub struct Analyzer {
    lexicon: Lexicon,
    detector: PhraseDetector,
    parser: ShallowParser,
    settings: RuleSettings,
}

impl Analyzer {
    /// Builds an analyzer around an injected lexicon and tagger.
    pub fn new(
        lexicon: Lexicon,
        tagger: Box<dyn Tagger + Send + Sync>,
        settings: RuleSettings,
    ) -> Result<Self, LexiconError> {
        lexicon.validate()?;
        let detector =
            PhraseDetector::new(&lexicon).map_err(|err| LexiconError::InvalidPattern(err.to_string()))?;
        let parser = ShallowParser::new(tagger, &lexicon);
        Ok(Self {
            lexicon,
            detector,
            parser,
            settings,
        })
    }

    /// Default lexicon with the built-in rule tagger.
    pub fn with_rule_tagger() -> Result<Self, LexiconError> {
        Self::new(
            Lexicon::default(),
            Box::new(RuleTagger::new()),
            RuleSettings::default(),
        )
    }

    pub fn settings(&self) -> &RuleSettings {
        &self.settings
    }

    /// Splits `text` into role/means/ends spans.
    pub fn chunk(&self, text: &str) -> TaggerResult<Chunks> {
        StoryChunker::new(&self.detector, &self.parser).chunk(text)
    }

    /// Rule candidates for `story` within `scope`.
    pub fn evaluate(
        &self,
        story: &Story,
        facts: &ProjectFacts,
        scope: DefectScope,
    ) -> TaggerResult<Vec<DefectCandidate>> {
        let context = RuleContext {
            lexicon: &self.lexicon,
            detector: &self.detector,
            parser: &self.parser,
            settings: &self.settings,
            facts,
        };
        rules::evaluate(story, &context, scope)
    }

    /// Canonical template for a set of chunked stories.
    pub fn compute_format<'a>(&self, stories: impl IntoIterator<Item = &'a Story>) -> ProjectFormat {
        consensus::compute_format(&self.detector, stories)
    }
}
