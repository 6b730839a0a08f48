//! Indicator phrase detection.
//!
//! # Responsibility
//! - Locate indicator phrases of each chunk kind in raw story text.
//! - Pick the longest matching phrase so `As a` never shadows `As an`.
//!
//! # Invariants
//! - Matching is case-insensitive.
//! - Role indicators only match at the start of the text.
//! - Means/ends indicators only match at a word boundary.

use regex::{Regex, RegexBuilder};

use crate::analysis::lexicon::Lexicon;
use crate::model::story::ChunkKind;

/// One detected indicator phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorMatch {
    /// Phrase as written in the lexicon (not as written in the text).
    pub phrase: String,
    /// Byte offset of the first matched character.
    pub offset: usize,
    /// Byte length of the matched text.
    pub len: usize,
}

impl IndicatorMatch {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Best indicator match per chunk kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedIndicators {
    pub role: Option<IndicatorMatch>,
    pub means: Option<IndicatorMatch>,
    pub ends: Option<IndicatorMatch>,
}

impl DetectedIndicators {
    pub fn offset(&self, kind: ChunkKind) -> Option<usize> {
        self.get(kind).map(|found| found.offset)
    }

    pub fn get(&self, kind: ChunkKind) -> Option<&IndicatorMatch> {
        match kind {
            ChunkKind::Role => self.role.as_ref(),
            ChunkKind::Means => self.means.as_ref(),
            ChunkKind::Ends => self.ends.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledIndicator {
    phrase: String,
    pattern: Regex,
}

/// Compiled indicator patterns for a lexicon.
#[derive(Debug, Clone)]
pub struct PhraseDetector {
    role: Vec<CompiledIndicator>,
    means: Vec<CompiledIndicator>,
    ends: Vec<CompiledIndicator>,
}

impl PhraseDetector {
    /// Compiles detection patterns for every indicator in `lexicon`.
    pub fn new(lexicon: &Lexicon) -> Result<Self, regex::Error> {
        Ok(Self {
            role: compile(lexicon.indicators(ChunkKind::Role), ChunkKind::Role)?,
            means: compile(lexicon.indicators(ChunkKind::Means), ChunkKind::Means)?,
            ends: compile(lexicon.indicators(ChunkKind::Ends), ChunkKind::Ends)?,
        })
    }

    /// Returns the longest indicator phrase of `kind` found in `text`.
    ///
    /// Ties on length keep the phrase listed first in the lexicon.
    pub fn detect_indicator_phrase(&self, text: &str, kind: ChunkKind) -> Option<IndicatorMatch> {
        let mut best: Option<IndicatorMatch> = None;
        for indicator in self.compiled(kind) {
            let Some(found) = indicator.pattern.find(text) else {
                continue;
            };
            let longer = best
                .as_ref()
                .map_or(true, |current| indicator.phrase.len() > current.phrase.len());
            if longer {
                best = Some(IndicatorMatch {
                    phrase: indicator.phrase.clone(),
                    offset: found.start(),
                    len: found.len(),
                });
            }
        }
        best
    }

    /// Detects the best indicator for every chunk kind.
    pub fn detect_indicators(&self, text: &str) -> DetectedIndicators {
        DetectedIndicators {
            role: self.detect_indicator_phrase(text, ChunkKind::Role),
            means: self.detect_indicator_phrase(text, ChunkKind::Means),
            ends: self.detect_indicator_phrase(text, ChunkKind::Ends),
        }
    }

    /// Returns the trimmed lexicon phrase used by a chunk, if any.
    pub fn extract_indicator_phrase(&self, chunk: Option<&str>, kind: ChunkKind) -> Option<String> {
        let chunk = chunk?;
        self.detect_indicator_phrase(chunk, kind)
            .map(|found| found.phrase.trim().to_string())
    }

    fn compiled(&self, kind: ChunkKind) -> &[CompiledIndicator] {
        match kind {
            ChunkKind::Role => &self.role,
            ChunkKind::Means => &self.means,
            ChunkKind::Ends => &self.ends,
        }
    }
}

fn compile(phrases: &[String], kind: ChunkKind) -> Result<Vec<CompiledIndicator>, regex::Error> {
    phrases
        .iter()
        .map(|phrase| {
            let escaped = regex::escape(phrase);
            let anchor = match kind {
                ChunkKind::Role => "^",
                _ if phrase.starts_with(|ch: char| ch.is_alphanumeric()) => r"\b",
                _ => "",
            };
            let pattern = RegexBuilder::new(&format!("{anchor}{escaped}"))
                .case_insensitive(true)
                .build()?;
            Ok(CompiledIndicator {
                phrase: phrase.clone(),
                pattern,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::PhraseDetector;
    use crate::analysis::lexicon::Lexicon;
    use crate::model::story::ChunkKind;

    fn detector() -> PhraseDetector {
        PhraseDetector::new(&Lexicon::default()).expect("default lexicon should compile")
    }

    #[test]
    fn longest_role_phrase_wins() {
        let found = detector()
            .detect_indicator_phrase("As an admin, I want to ban users", ChunkKind::Role)
            .expect("role should be detected");
        assert_eq!(found.phrase, "As an ");
        assert_eq!(found.offset, 0);
    }

    #[test]
    fn role_is_anchored_to_start() {
        let found = detector().detect_indicator_phrase(
            "Users want to log in as a guest",
            ChunkKind::Role,
        );
        assert!(found.is_none());
    }

    #[test]
    fn detection_is_case_insensitive_and_reports_offsets() {
        let text = "As a User, I want to add a user story, so that I document a requirement";
        let indicators = detector().detect_indicators(text);
        assert_eq!(indicators.offset(ChunkKind::Role), Some(0));
        assert_eq!(indicators.offset(ChunkKind::Means), Some(11));
        assert_eq!(indicators.offset(ChunkKind::Ends), Some(39));
        assert_eq!(
            indicators.ends.as_ref().map(|found| found.phrase.as_str()),
            Some("So that ")
        );
    }

    #[test]
    fn ends_phrase_does_not_match_inside_words() {
        let found = detector().detect_indicator_phrase("I want to do it also soon", ChunkKind::Ends);
        assert!(found.is_none());
    }

    #[test]
    fn extract_returns_trimmed_lexicon_phrase() {
        let phrase = detector().extract_indicator_phrase(Some("i am able to sign up,"), ChunkKind::Means);
        assert_eq!(phrase.as_deref(), Some("I am able to"));
        assert_eq!(detector().extract_indicator_phrase(None, ChunkKind::Means), None);
    }
}
