//! Story chunker.
//!
//! # Responsibility
//! - Carve a story into role/means/ends spans from indicator offsets.
//! - Recover a missing role or means through the shallow grammar matcher.
//!
//! # Invariants
//! - Every produced span is a trimmed literal substring of the story text.
//! - A tagger failure aborts the whole chunking; no partial spans escape.

use crate::analysis::grammar::Constituent;
use crate::analysis::matcher::ShallowParser;
use crate::analysis::phrase::{DetectedIndicators, IndicatorMatch, PhraseDetector};
use crate::analysis::tagger::TaggerResult;
use crate::model::story::{ChunkKind, Chunks};

/// Splits story text into chunks.
pub struct StoryChunker<'a> {
    detector: &'a PhraseDetector,
    parser: &'a ShallowParser,
}

impl<'a> StoryChunker<'a> {
    pub fn new(detector: &'a PhraseDetector, parser: &'a ShallowParser) -> Self {
        Self { detector, parser }
    }

    /// Computes all chunk spans for `text`.
    pub fn chunk(&self, text: &str) -> TaggerResult<Chunks> {
        let indicators = self.ordered_indicators(text);
        let mut chunks = Chunks::default();

        match (&indicators.role, &indicators.means) {
            (Some(role), Some(means)) => {
                let means_end = indicators
                    .ends
                    .as_ref()
                    .map(|ends| ends.offset)
                    .filter(|offset| *offset >= means.offset)
                    .unwrap_or(text.len());
                chunks.role = span(text, role.offset, means.offset.max(role.offset));
                chunks.means = span(text, means.offset, means_end);
            }
            (Some(role), None) => {
                chunks.role = self.role_from_noun_phrases(text, role)?;
            }
            _ => {}
        }

        if let Some(ends) = &indicators.ends {
            chunks.ends = span(text, ends.offset, text.len());
        }

        if chunks.means.is_none() {
            let residual = residual_text(text, &chunks);
            if !residual.is_empty()
                && !self
                    .parser
                    .well_formed_content_rule(&residual, ChunkKind::Means, &["MEANS"])?
            {
                chunks.means = Some(residual);
            }
        }
        Ok(chunks)
    }

    /// Detects indicators and drops a means indicator found past the ends one.
    fn ordered_indicators(&self, text: &str) -> DetectedIndicators {
        let mut indicators = self.detector.detect_indicators(text);
        if let (Some(means), Some(ends)) = (&indicators.means, &indicators.ends) {
            if means.offset >= ends.offset {
                let before_ends = &text[..ends.offset];
                indicators.means = self
                    .detector
                    .detect_indicator_phrase(before_ends, ChunkKind::Means);
            }
        }
        indicators
    }

    /// Role indicator plus the leading noun phrases that follow it.
    fn role_from_noun_phrases(
        &self,
        text: &str,
        role: &IndicatorMatch,
    ) -> TaggerResult<Option<String>> {
        let remainder_start = role.end();
        let remainder = &text[remainder_start..];
        let tree = self.parser.content_chunk(remainder, ChunkKind::Role)?;

        let mut run_end: Option<usize> = None;
        for constituent in tree.children() {
            let collectable = match constituent {
                Constituent::Phrase(phrase) => phrase.label == "NP",
                Constituent::Token(token) => token.tag == ",",
            };
            let starts_with_i = constituent
                .first_token()
                .is_some_and(|token| token.text == "I");
            if !collectable || starts_with_i {
                break;
            }
            match constituent.last_token().and_then(|token| token.span.clone()) {
                Some(token_span) => run_end = Some(remainder_start + token_span.end),
                None => break,
            }
        }

        Ok(run_end.and_then(|end| span(text, role.offset, end)))
    }
}

/// Trimmed `text[start..end]`, absent when empty.
fn span(text: &str, start: usize, end: usize) -> Option<String> {
    let slice = text.get(start..end)?.trim();
    (!slice.is_empty()).then(|| slice.to_string())
}

/// Story text with the assigned role and ends removed once each.
fn residual_text(text: &str, chunks: &Chunks) -> String {
    let mut residual = text.to_string();
    for assigned in [chunks.role.as_deref(), chunks.ends.as_deref()]
        .into_iter()
        .flatten()
    {
        residual = residual.replacen(assigned, "", 1);
    }
    residual.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::StoryChunker;
    use crate::analysis::lexicon::Lexicon;
    use crate::analysis::matcher::ShallowParser;
    use crate::analysis::phrase::PhraseDetector;
    use crate::analysis::tagger::RuleTagger;
    use crate::model::story::Chunks;

    fn chunk(text: &str) -> Chunks {
        let lexicon = Lexicon::default();
        let detector = PhraseDetector::new(&lexicon).expect("default lexicon should compile");
        let parser = ShallowParser::new(Box::new(RuleTagger::new()), &lexicon);
        StoryChunker::new(&detector, &parser)
            .chunk(text)
            .expect("rule tagger never fails")
    }

    #[test]
    fn splits_canonical_story() {
        let chunks = chunk("As a User, I want to add a user story, so that I document a requirement");
        assert_eq!(chunks.role.as_deref(), Some("As a User,"));
        assert_eq!(chunks.means.as_deref(), Some("I want to add a user story,"));
        assert_eq!(chunks.ends.as_deref(), Some("so that I document a requirement"));
    }

    #[test]
    fn role_falls_back_to_noun_phrases() {
        let chunks = chunk("As a User, so that I document a requirement");
        assert_eq!(chunks.role.as_deref(), Some("As a User,"));
        assert_eq!(chunks.means, None);
        assert_eq!(chunks.ends.as_deref(), Some("so that I document a requirement"));
    }

    #[test]
    fn residual_with_verb_phrase_becomes_means() {
        let chunks = chunk("User wants to add a user story, so that I document a requirement");
        assert_eq!(chunks.role, None);
        assert_eq!(chunks.means.as_deref(), Some("User wants to add a user story,"));
    }

    #[test]
    fn means_after_ends_is_redetected_before_ends() {
        let chunks = chunk("As a manager, so that I want to plan, I wish to see reports");
        assert_eq!(chunks.ends.as_deref(), Some("so that I want to plan, I wish to see reports"));
        assert_eq!(chunks.role.as_deref(), Some("As a manager,"));
        assert_eq!(chunks.means, None);
    }

    #[test]
    fn story_without_indicators_keeps_verb_phrase_as_means() {
        let chunks = chunk("Export reports");
        assert_eq!(chunks.role, None);
        assert_eq!(chunks.ends, None);
        assert_eq!(chunks.means.as_deref(), Some("Export reports"));
    }
}
