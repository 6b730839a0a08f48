//! Shallow grammar matcher.
//!
//! # Responsibility
//! - Tag chunk text, drop indicator tokens and chunk the rest.
//! - Answer "does this chunk contain constituent X" questions for rules.
//!
//! # Invariants
//! - Indicator tokens are removed only where they occur as a contiguous run.
//! - Token spans in the returned tree are byte offsets into the input text.

use crate::analysis::grammar::{ChunkGrammar, ParseTree};
use crate::analysis::lexicon::Lexicon;
use crate::analysis::tagger::{align_spans, tokenize, TaggedToken, Tagger, TaggerResult};
use crate::model::story::ChunkKind;

/// Tagger plus chunk grammar.
pub struct ShallowParser {
    tagger: Box<dyn Tagger + Send + Sync>,
    grammar: ChunkGrammar,
    /// Lowercased indicator token runs per chunk kind, longest first.
    indicator_runs: [Vec<Vec<String>>; 3],
}

impl ShallowParser {
    pub fn new(tagger: Box<dyn Tagger + Send + Sync>, lexicon: &Lexicon) -> Self {
        Self {
            tagger,
            grammar: ChunkGrammar::story(),
            indicator_runs: ChunkKind::ALL.map(|kind| indicator_runs(lexicon, kind)),
        }
    }

    /// Tags `text` into one flat token stream with spans.
    pub fn tag(&self, text: &str) -> TaggerResult<Vec<TaggedToken>> {
        let mut tokens: Vec<TaggedToken> = self.tagger.tag(text)?.into_iter().flatten().collect();
        align_spans(text, &mut tokens);
        Ok(tokens)
    }

    /// Chunks `text` after removing indicator tokens of `kind`.
    pub fn content_chunk(&self, text: &str, kind: ChunkKind) -> TaggerResult<ParseTree> {
        let tokens = self.tag(text)?;
        let tokens = self.strip_indicators(tokens, kind);
        Ok(self.grammar.apply(tokens))
    }

    /// Returns `false` when any constituent label contains one of `labels`.
    ///
    /// Presence of a label means the check failed, e.g. a `MEANS` constituent
    /// inside a conjunction segment.
    pub fn well_formed_content_rule(
        &self,
        text: &str,
        kind: ChunkKind,
        labels: &[&str],
    ) -> TaggerResult<bool> {
        let tree = self.content_chunk(text, kind)?;
        Ok(!labels
            .iter()
            .any(|label| tree.has_label_containing(&label.to_uppercase())))
    }

    fn strip_indicators(&self, mut tokens: Vec<TaggedToken>, kind: ChunkKind) -> Vec<TaggedToken> {
        for run in &self.indicator_runs[kind.position()] {
            tokens = remove_runs(tokens, run);
        }
        tokens
    }
}

fn indicator_runs(lexicon: &Lexicon, kind: ChunkKind) -> Vec<Vec<String>> {
    let mut runs: Vec<Vec<String>> = lexicon
        .indicators(kind)
        .iter()
        .map(|phrase| {
            tokenize(phrase)
                .into_iter()
                .map(|token| token.text.to_lowercase())
                .collect::<Vec<_>>()
        })
        .filter(|run| !run.is_empty())
        .collect();
    runs.sort_by(|left, right| right.len().cmp(&left.len()));
    runs
}

fn remove_runs(tokens: Vec<TaggedToken>, run: &[String]) -> Vec<TaggedToken> {
    if run.is_empty() || tokens.len() < run.len() {
        return tokens;
    }
    let mut kept = Vec::with_capacity(tokens.len());
    let mut index = 0;
    while index < tokens.len() {
        let matches = tokens.len() - index >= run.len()
            && tokens[index..index + run.len()]
                .iter()
                .zip(run)
                .all(|(token, word)| token.text.to_lowercase() == *word);
        if matches {
            index += run.len();
        } else {
            kept.push(tokens[index].clone());
            index += 1;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::ShallowParser;
    use crate::analysis::lexicon::Lexicon;
    use crate::analysis::tagger::RuleTagger;
    use crate::model::story::ChunkKind;

    fn parser() -> ShallowParser {
        ShallowParser::new(Box::new(RuleTagger::new()), &Lexicon::default())
    }

    #[test]
    fn strips_means_indicator_tokens() {
        let tree = parser()
            .content_chunk("I want to add a user story,", ChunkKind::Means)
            .expect("rule tagger never fails");
        let rendered = tree.to_string();
        assert!(!rendered.contains("want"), "{rendered}");
        assert!(tree.has_label_containing("MEANS"));
    }

    #[test]
    fn verb_phrase_makes_means_check_fail() {
        let parser = parser();
        assert!(!parser
            .well_formed_content_rule("sell the system", ChunkKind::Means, &["MEANS"])
            .expect("rule tagger never fails"));
        assert!(parser
            .well_formed_content_rule("the system", ChunkKind::Means, &["means"])
            .expect("rule tagger never fails"));
    }

    #[test]
    fn empty_text_has_no_constituents() {
        let tree = parser()
            .content_chunk("", ChunkKind::Means)
            .expect("rule tagger never fails");
        assert!(tree.children().is_empty());
    }

    #[test]
    fn spans_point_into_input() {
        let tokens = parser().tag("User, so").expect("rule tagger never fails");
        assert_eq!(tokens[0].span, Some(0..4));
        assert_eq!(tokens[1].span, Some(4..5));
    }
}
