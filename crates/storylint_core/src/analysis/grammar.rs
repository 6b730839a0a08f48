//! Cascaded chunk grammar over tagged tokens.
//!
//! # Responsibility
//! - Parse `LABEL: {<TAG|TAG.*>?<LABEL>*}` rule lines.
//! - Group tagged tokens into flat labelled constituents.
//!
//! # Invariants
//! - Rules run as stages in declaration order; each stage sees the output of
//!   the previous one, so later rules can match earlier labels.
//! - Within a stage matches are leftmost, non-overlapping and greedy.
//! - A pattern element matches the whole tag (or label), never a prefix,
//!   unless the element itself ends in `.*`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::analysis::tagger::TaggedToken;

/// The six-rule grammar used for story chunk validation.
pub const STORY_GRAMMAR: &str = "
    NP: {<DT|JJ|NN.*>}
    NNP: {<NNP.*>}
    AP: {<RB.*|JJ.*>}
    VP: {<VB.*><NP>*}
    MEANS: {<AP>?<VP>}
    ENDS: {<AP>?<VP>}
";

static RULE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9_]*)\s*:\s*\{(.*)\}$").expect("valid rule line regex")
});
static ELEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>]+)>([?*+]?)").expect("valid element regex"));

/// Grammar definition failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    InvalidLine(String),
    InvalidTagPattern(String),
    EmptyGrammar,
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLine(line) => write!(f, "invalid chunk rule `{line}`"),
            Self::InvalidTagPattern(pattern) => write!(f, "invalid tag pattern `{pattern}`"),
            Self::EmptyGrammar => write!(f, "chunk grammar has no rules"),
        }
    }
}

impl Error for GrammarError {}

/// A token or a labelled group of constituents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constituent {
    Token(TaggedToken),
    Phrase(Phrase),
}

impl Constituent {
    /// Tag for tokens, label for phrases.
    pub fn symbol(&self) -> &str {
        match self {
            Self::Token(token) => token.tag.as_str(),
            Self::Phrase(phrase) => phrase.label.as_str(),
        }
    }

    /// First token covered by this constituent.
    pub fn first_token(&self) -> Option<&TaggedToken> {
        match self {
            Self::Token(token) => Some(token),
            Self::Phrase(phrase) => phrase.children.first().and_then(Constituent::first_token),
        }
    }

    /// Last token covered by this constituent.
    pub fn last_token(&self) -> Option<&TaggedToken> {
        match self {
            Self::Token(token) => Some(token),
            Self::Phrase(phrase) => phrase.children.last().and_then(Constituent::last_token),
        }
    }
}

impl Display for Constituent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(token) => write!(f, "{}/{}", token.text, token.tag),
            Self::Phrase(phrase) => write!(f, "{phrase}"),
        }
    }
}

/// Labelled constituent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub label: String,
    pub children: Vec<Constituent>,
}

impl Phrase {
    /// Whether this phrase or any nested phrase has a label containing `needle`.
    pub fn has_label_containing(&self, needle: &str) -> bool {
        self.label.contains(needle)
            || self.children.iter().any(|child| match child {
                Constituent::Phrase(phrase) => phrase.has_label_containing(needle),
                Constituent::Token(_) => false,
            })
    }
}

impl Display for Phrase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}", self.label)?;
        for child in &self.children {
            write!(f, " {child}")?;
        }
        write!(f, ")")
    }
}

/// Chunked sentence rooted at an `S` phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree {
    pub root: Phrase,
}

impl ParseTree {
    /// Top-level constituents in text order.
    pub fn children(&self) -> &[Constituent] {
        &self.root.children
    }

    pub fn has_label_containing(&self, needle: &str) -> bool {
        self.root.has_label_containing(needle)
    }
}

impl Display for ParseTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl Repeat {
    fn bounds(self) -> (usize, usize) {
        match self {
            Self::One => (1, 1),
            Self::Optional => (0, 1),
            Self::ZeroOrMore => (0, usize::MAX),
            Self::OneOrMore => (1, usize::MAX),
        }
    }
}

#[derive(Debug, Clone)]
struct PatternElement {
    symbol: Regex,
    repeat: Repeat,
}

#[derive(Debug, Clone)]
struct ChunkRule {
    label: String,
    pattern: Vec<PatternElement>,
}

/// Ordered set of chunk rules.
#[derive(Debug, Clone)]
pub struct ChunkGrammar {
    rules: Vec<ChunkRule>,
}

impl ChunkGrammar {
    /// Parses one rule per non-empty line.
    pub fn parse(source: &str) -> Result<Self, GrammarError> {
        let mut rules = Vec::new();
        for line in source.lines().map(str::trim).filter(|line| !line.is_empty()) {
            rules.push(parse_rule(line)?);
        }
        if rules.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }
        Ok(Self { rules })
    }

    /// Grammar used for story chunks.
    pub fn story() -> Self {
        Self::parse(STORY_GRAMMAR).unwrap_or_else(|err| unreachable!("built-in grammar: {err}"))
    }

    /// Labels in stage order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.label.as_str())
    }

    /// Chunks one token sequence.
    pub fn apply(&self, tokens: Vec<TaggedToken>) -> ParseTree {
        let mut items: Vec<Constituent> = tokens.into_iter().map(Constituent::Token).collect();
        for rule in &self.rules {
            items = apply_rule(rule, items);
        }
        ParseTree {
            root: Phrase {
                label: "S".to_string(),
                children: items,
            },
        }
    }
}

fn parse_rule(line: &str) -> Result<ChunkRule, GrammarError> {
    let captures = RULE_LINE_RE
        .captures(line)
        .ok_or_else(|| GrammarError::InvalidLine(line.to_string()))?;
    let label = captures[1].to_string();
    let body: String = captures[2].chars().filter(|ch| !ch.is_whitespace()).collect();

    let mut pattern = Vec::new();
    let mut consumed = 0;
    for element in ELEMENT_RE.captures_iter(&body) {
        let whole = element.get(0).map_or(0, |found| found.len());
        consumed += whole;
        let alternatives = element[1].replace('.', "[^{}<>]");
        let symbol = Regex::new(&format!("^(?:{alternatives})$"))
            .map_err(|_| GrammarError::InvalidTagPattern(element[1].to_string()))?;
        let repeat = match &element[2] {
            "?" => Repeat::Optional,
            "*" => Repeat::ZeroOrMore,
            "+" => Repeat::OneOrMore,
            _ => Repeat::One,
        };
        pattern.push(PatternElement { symbol, repeat });
    }
    if pattern.is_empty() || consumed != body.len() {
        return Err(GrammarError::InvalidLine(line.to_string()));
    }
    Ok(ChunkRule { label, pattern })
}

fn apply_rule(rule: &ChunkRule, items: Vec<Constituent>) -> Vec<Constituent> {
    let mut output = Vec::with_capacity(items.len());
    let mut remaining = items;
    while !remaining.is_empty() {
        match match_len(&remaining, &rule.pattern) {
            Some(len) if len > 0 => {
                let tail = remaining.split_off(len);
                output.push(Constituent::Phrase(Phrase {
                    label: rule.label.clone(),
                    children: remaining,
                }));
                remaining = tail;
            }
            _ => output.push(remaining.remove(0)),
        }
    }
    output
}

/// Length of the greedy match of `pattern` at the start of `items`.
fn match_len(items: &[Constituent], pattern: &[PatternElement]) -> Option<usize> {
    let Some((element, remaining)) = pattern.split_first() else {
        return Some(0);
    };
    let (min, max) = element.repeat.bounds();
    let available = items
        .iter()
        .take(max)
        .take_while(|item| element.symbol.is_match(item.symbol()))
        .count();
    if available < min {
        return None;
    }
    (min..=available)
        .rev()
        .find_map(|taken| match_len(&items[taken..], remaining).map(|tail| taken + tail))
}

#[cfg(test)]
mod tests {
    use super::{ChunkGrammar, Constituent, GrammarError};
    use crate::analysis::tagger::TaggedToken;

    fn tokens(pairs: &[(&str, &str)]) -> Vec<TaggedToken> {
        pairs
            .iter()
            .map(|(text, tag)| TaggedToken::new(*text, *tag))
            .collect()
    }

    #[test]
    fn story_grammar_has_six_stages() {
        let grammar = ChunkGrammar::story();
        let labels: Vec<&str> = grammar.labels().collect();
        assert_eq!(labels, vec!["NP", "NNP", "AP", "VP", "MEANS", "ENDS"]);
    }

    #[test]
    fn verb_with_objects_becomes_means() {
        let tree = ChunkGrammar::story().apply(tokens(&[
            ("sell", "VB"),
            ("the", "DT"),
            ("system", "NN"),
        ]));
        assert_eq!(tree.to_string(), "(S (MEANS (VP sell/VB (NP the/DT) (NP system/NN))))");
        assert!(tree.has_label_containing("MEANS"));
    }

    #[test]
    fn each_noun_token_is_its_own_np() {
        let tree = ChunkGrammar::story().apply(tokens(&[
            ("User", "NNP"),
            (",", ","),
            ("so", "RB"),
            ("that", "IN"),
        ]));
        let symbols: Vec<&str> = tree.children().iter().map(Constituent::symbol).collect();
        assert_eq!(symbols, vec!["NP", ",", "AP", "IN"]);
        assert!(!tree.has_label_containing("MEANS"));
    }

    #[test]
    fn adverb_before_verb_joins_means() {
        let tree = ChunkGrammar::story().apply(tokens(&[
            ("quickly", "RB"),
            ("add", "VB"),
            ("notes", "NNS"),
        ]));
        assert_eq!(
            tree.to_string(),
            "(S (MEANS (AP quickly/RB) (VP add/VB (NP notes/NNS))))"
        );
    }

    #[test]
    fn label_check_is_substring_based() {
        let tree = ChunkGrammar::parse("NNP: {<NNP>}")
            .expect("grammar should parse")
            .apply(tokens(&[("Alice", "NNP")]));
        assert!(tree.has_label_containing("NP"));
    }

    #[test]
    fn rejects_malformed_rules() {
        assert!(matches!(
            ChunkGrammar::parse("NP {<DT>}"),
            Err(GrammarError::InvalidLine(_))
        ));
        assert!(matches!(
            ChunkGrammar::parse("NP: {<DT> junk}"),
            Err(GrammarError::InvalidLine(_))
        ));
        assert!(matches!(ChunkGrammar::parse("  "), Err(GrammarError::EmptyGrammar)));
    }
}
