//! Treebank-style word tokenizer.
//!
//! Splits on whitespace, peels surrounding punctuation into separate tokens
//! and separates English contractions (`I'm` -> `I` + `'m`).

use std::ops::Range;

const LEADING_PUNCT: &[char] = &['(', '[', '{', '"', '\'', '`', '\u{27e8}', '\u{201c}'];
const TRAILING_PUNCT: &[char] = &[
    '.', ',', ';', ':', '!', '?', ')', ']', '}', '"', '\'', '\u{27e9}', '\u{201d}',
];
const CONTRACTIONS: &[&str] = &["'m", "'s", "'re", "'ve", "'ll", "'d"];

/// A token and its byte range in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub span: Range<usize>,
}

/// Tokenizes `text` into words and punctuation.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (start, word) in split_whitespace_indices(text) {
        tokenize_word(word, start, &mut tokens);
    }
    tokens
}

fn split_whitespace_indices(text: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut word_start: Option<usize> = None;
    for (index, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(start) = word_start.take() {
                words.push((start, &text[start..index]));
            }
        } else if word_start.is_none() {
            word_start = Some(index);
        }
    }
    if let Some(start) = word_start {
        words.push((start, &text[start..]));
    }
    words
}

fn tokenize_word(word: &str, offset: usize, tokens: &mut Vec<Token>) {
    let mut start = 0;
    let mut end = word.len();

    while let Some(ch) = word[start..end].chars().next() {
        if !LEADING_PUNCT.contains(&ch) || start + ch.len_utf8() == end {
            break;
        }
        push(tokens, word, offset, start, start + ch.len_utf8());
        start += ch.len_utf8();
    }

    let mut trailing = Vec::new();
    while let Some(ch) = word[start..end].chars().next_back() {
        if !TRAILING_PUNCT.contains(&ch) || end - ch.len_utf8() <= start {
            break;
        }
        trailing.push((end - ch.len_utf8(), end));
        end -= ch.len_utf8();
    }

    if start < end {
        let core = &word[start..end];
        let split = contraction_split(core);
        match split {
            Some(at) if at > 0 => {
                push(tokens, word, offset, start, start + at);
                push(tokens, word, offset, start + at, end);
            }
            _ => push(tokens, word, offset, start, end),
        }
    }

    for (piece_start, piece_end) in trailing.into_iter().rev() {
        push(tokens, word, offset, piece_start, piece_end);
    }
}

/// Byte index where a contraction suffix begins, if any.
fn contraction_split(core: &str) -> Option<usize> {
    let lower = core.to_ascii_lowercase();
    if lower.ends_with("n't") && lower.len() > 3 {
        return Some(core.len() - 3);
    }
    CONTRACTIONS
        .iter()
        .find(|suffix| lower.ends_with(*suffix) && lower.len() > suffix.len())
        .map(|suffix| core.len() - suffix.len())
}

fn push(tokens: &mut Vec<Token>, word: &str, offset: usize, start: usize, end: usize) {
    tokens.push(Token {
        text: word[start..end].to_string(),
        span: offset + start..offset + end,
    });
}

#[cfg(test)]
mod tests {
    use super::tokenize;

    fn texts(input: &str) -> Vec<String> {
        tokenize(input).into_iter().map(|token| token.text).collect()
    }

    #[test]
    fn splits_trailing_punctuation() {
        assert_eq!(texts("As a User, I"), vec!["As", "a", "User", ",", "I"]);
    }

    #[test]
    fn splits_contractions() {
        assert_eq!(texts("I'm able"), vec!["I", "'m", "able"]);
        assert_eq!(texts("don't"), vec!["do", "n't"]);
    }

    #[test]
    fn splits_brackets() {
        assert_eq!(texts("(for money)."), vec!["(", "for", "money", ")", "."]);
    }

    #[test]
    fn keeps_byte_spans() {
        let tokens = tokenize("sell  it");
        assert_eq!(tokens[1].span, 6..8);
    }

    #[test]
    fn lone_punctuation_is_one_token() {
        assert_eq!(texts("a & b"), vec!["a", "&", "b"]);
        assert_eq!(texts("a ( b"), vec!["a", "(", "b"]);
    }
}
