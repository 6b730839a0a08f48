//! Part-of-speech tagging boundary.
//!
//! # Responsibility
//! - Define the `Tagger` contract consumed by the grammar matcher.
//! - Provide a built-in rule tagger and an external process adapter.
//!
//! # Invariants
//! - Taggers are deterministic for identical input.
//! - A timeout is a retryable failure, never an empty tagging.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::ops::Range;
use std::time::Duration;

mod process;
mod rule;
mod tokenize;

pub use process::{ProcessTagger, TimeoutPolicy};
pub use rule::RuleTagger;
pub use tokenize::{tokenize, Token};

/// One token with its Penn Treebank tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedToken {
    pub text: String,
    pub tag: String,
    /// Byte range of the token in the tagged text, when known.
    pub span: Option<Range<usize>>,
}

impl TaggedToken {
    pub fn new(text: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tag: tag.into(),
            span: None,
        }
    }
}

/// Tagged sentences, one inner vector per sentence.
pub type TaggedText = Vec<Vec<TaggedToken>>;

pub type TaggerResult<T> = Result<T, TaggerError>;

/// Text to tags oracle.
pub trait Tagger {
    fn tag(&self, text: &str) -> TaggerResult<TaggedText>;
}

impl<T: Tagger + ?Sized> Tagger for Box<T> {
    fn tag(&self, text: &str) -> TaggerResult<TaggedText> {
        (**self).tag(text)
    }
}

/// Tagging failure.
#[derive(Debug)]
pub enum TaggerError {
    /// No tagged output arrived within the allowed budget.
    Timeout { after: Duration },
    /// The tagger process could not be started or written to.
    Io(io::Error),
    /// The tagger process exited or closed its output.
    Closed,
    /// Output could not be interpreted as tagged tokens.
    Protocol(String),
}

impl TaggerError {
    /// Whether the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl Display for TaggerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { after } => {
                write!(f, "tagger timed out after {:.2} seconds", after.as_secs_f64())
            }
            Self::Io(err) => write!(f, "tagger io failure: {err}"),
            Self::Closed => write!(f, "tagger process closed its output"),
            Self::Protocol(message) => write!(f, "unexpected tagger output: {message}"),
        }
    }
}

impl Error for TaggerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for TaggerError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Fills missing token spans by scanning `text` left to right.
///
/// Tokens that cannot be found after the previous token keep `span = None`.
pub fn align_spans(text: &str, tokens: &mut [TaggedToken]) {
    let mut cursor = 0;
    for token in tokens.iter_mut() {
        if let Some(span) = &token.span {
            cursor = span.end;
            continue;
        }
        if token.text.is_empty() {
            continue;
        }
        if let Some(found) = text[cursor..].find(token.text.as_str()) {
            let start = cursor + found;
            let end = start + token.text.len();
            token.span = Some(start..end);
            cursor = end;
        }
    }
}

/// Splits a flat token stream into sentences at sentence-final tags.
pub(crate) fn split_sentences(tokens: Vec<TaggedToken>) -> TaggedText {
    let mut sentences = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        let ends_sentence = token.tag == ".";
        current.push(token);
        if ends_sentence {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::{align_spans, split_sentences, TaggedToken, TaggerError};
    use std::time::Duration;

    #[test]
    fn align_spans_walks_forward() {
        let text = "a user, a story";
        let mut tokens = vec![
            TaggedToken::new("a", "DT"),
            TaggedToken::new("user", "NN"),
            TaggedToken::new(",", ","),
            TaggedToken::new("a", "DT"),
            TaggedToken::new("``", "``"),
            TaggedToken::new("story", "NN"),
        ];
        align_spans(text, &mut tokens);
        assert_eq!(tokens[0].span, Some(0..1));
        assert_eq!(tokens[3].span, Some(8..9));
        assert_eq!(tokens[4].span, None);
        assert_eq!(tokens[5].span, Some(10..15));
    }

    #[test]
    fn split_sentences_breaks_after_period() {
        let sentences = split_sentences(vec![
            TaggedToken::new("Done", "VBN"),
            TaggedToken::new(".", "."),
            TaggedToken::new("Next", "JJ"),
        ]);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1][0].text, "Next");
    }

    #[test]
    fn only_timeouts_are_retryable() {
        assert!(TaggerError::Timeout {
            after: Duration::from_secs(3)
        }
        .is_retryable());
        assert!(!TaggerError::Closed.is_retryable());
    }
}
