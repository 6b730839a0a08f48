//! Indicator lexicon.
//!
//! # Responsibility
//! - Hold the phrase sets that mark role/means/ends chunks.
//! - Hold conjunction, punctuation and bracket sets used by rules.
//!
//! # Invariants
//! - A lexicon is immutable once injected into an analyzer.
//! - Indicator phrases keep their trailing space; it is part of the match.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::model::story::ChunkKind;

/// Phrase sets consumed by the chunker and the rule engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    pub role: Vec<String>,
    pub means: Vec<String>,
    pub ends: Vec<String>,
    pub conjunctions: Vec<String>,
    pub punctuation: Vec<String>,
    pub brackets: Vec<[char; 2]>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            role: strings(&["As an ", "As a ", "As "]),
            means: strings(&["I'm able to ", "I am able to ", "I want to ", "I wish to "]),
            ends: strings(&["So that ", "In order to ", "So "]),
            conjunctions: strings(&[" and ", "&", "+", " or "]),
            punctuation: strings(&[
                ".", ";", ":", "\u{2012}", "\u{2013}", "\u{2014}", "\u{2015}", "\u{2010}", "-",
                "?",
            ]),
            brackets: vec![['(', ')'], ['[', ']'], ['{', '}'], ['\u{27e8}', '\u{27e9}']],
        }
    }
}

impl Lexicon {
    /// Indicator phrases for one chunk kind.
    pub fn indicators(&self, kind: ChunkKind) -> &[String] {
        match kind {
            ChunkKind::Role => &self.role,
            ChunkKind::Means => &self.means,
            ChunkKind::Ends => &self.ends,
        }
    }

    /// Rejects lexicons the chunker cannot work with.
    pub fn validate(&self) -> Result<(), LexiconError> {
        for kind in ChunkKind::ALL {
            let phrases = self.indicators(kind);
            if phrases.is_empty() {
                return Err(LexiconError::NoIndicators(kind));
            }
            if phrases.iter().any(|phrase| phrase.trim().is_empty()) {
                return Err(LexiconError::BlankEntry("indicator"));
            }
        }
        if self.conjunctions.iter().any(String::is_empty) {
            return Err(LexiconError::BlankEntry("conjunction"));
        }
        if self.punctuation.iter().any(String::is_empty) {
            return Err(LexiconError::BlankEntry("punctuation"));
        }
        if let Some([open, close]) = self.brackets.iter().find(|[open, close]| open == close) {
            return Err(LexiconError::AmbiguousBracket(*open, *close));
        }
        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

/// Lexicon validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexiconError {
    NoIndicators(ChunkKind),
    BlankEntry(&'static str),
    AmbiguousBracket(char, char),
    InvalidPattern(String),
}

impl Display for LexiconError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoIndicators(kind) => write!(f, "lexicon has no {kind} indicators"),
            Self::BlankEntry(set) => write!(f, "lexicon contains a blank {set} entry"),
            Self::AmbiguousBracket(open, close) => {
                write!(f, "bracket pair `{open}{close}` uses the same character twice")
            }
            Self::InvalidPattern(message) => write!(f, "indicator pattern failed to compile: {message}"),
        }
    }
}

impl Error for LexiconError {}

#[cfg(test)]
mod tests {
    use super::{Lexicon, LexiconError};
    use crate::model::story::ChunkKind;

    #[test]
    fn default_lexicon_is_valid() {
        let lexicon = Lexicon::default();
        assert!(lexicon.validate().is_ok());
        assert_eq!(lexicon.indicators(ChunkKind::Role)[1], "As a ");
    }

    #[test]
    fn validate_rejects_empty_indicator_set() {
        let lexicon = Lexicon {
            ends: Vec::new(),
            ..Lexicon::default()
        };
        assert_eq!(
            lexicon.validate(),
            Err(LexiconError::NoIndicators(ChunkKind::Ends))
        );
    }

    #[test]
    fn partial_json_keeps_default_sets() {
        let lexicon: Lexicon =
            serde_json::from_str(r#"{"role": ["As the "]}"#).expect("lexicon json should parse");
        assert_eq!(lexicon.role, vec!["As the ".to_string()]);
        assert_eq!(lexicon.means, Lexicon::default().means);
    }
}
