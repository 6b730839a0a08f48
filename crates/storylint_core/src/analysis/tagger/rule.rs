//! Deterministic lexicon-and-context tagger.
//!
//! Covers the closed word classes exhaustively and guesses open classes from
//! a small verb/adjective/adverb vocabulary, suffixes and the previous tag.
//! Accurate enough for the short imperative clauses found in user stories;
//! swap in [`super::ProcessTagger`] for a trained model.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use super::tokenize::tokenize;
use super::{split_sentences, TaggedText, TaggedToken, Tagger, TaggerResult};

static CLOSED_CLASS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut words = HashMap::new();
    for word in ["a", "an", "the", "this", "these", "those", "every", "each", "some", "any", "all", "no", "another"] {
        words.insert(word, "DT");
    }
    for word in ["i", "you", "we", "they", "he", "she", "it", "me", "us", "them", "him"] {
        words.insert(word, "PRP");
    }
    for word in ["my", "our", "your", "their", "his", "her", "its"] {
        words.insert(word, "PRP$");
    }
    for word in [
        "in", "on", "at", "of", "for", "with", "by", "from", "about", "into", "as", "than",
        "via", "without", "within", "per", "through", "during", "before", "after", "over",
        "under", "between", "that", "if", "because", "while", "across", "like", "whether",
    ] {
        words.insert(word, "IN");
    }
    for word in ["and", "or", "but", "nor", "&", "+"] {
        words.insert(word, "CC");
    }
    for word in ["can", "could", "will", "would", "shall", "should", "may", "might", "must"] {
        words.insert(word, "MD");
    }
    for word in ["who", "what", "which"] {
        words.insert(word, "WP");
    }
    for word in ["when", "where", "how", "why"] {
        words.insert(word, "WRB");
    }
    words.insert("to", "TO");
    words.insert("not", "RB");
    words.insert("n't", "RB");
    words.insert("so", "RB");
    words.insert("there", "EX");
    words.insert("am", "VBP");
    words.insert("'m", "VBP");
    words.insert("are", "VBP");
    words.insert("'re", "VBP");
    words.insert("is", "VBZ");
    words.insert("was", "VBD");
    words.insert("were", "VBD");
    words.insert("be", "VB");
    words.insert("been", "VBN");
    words.insert("being", "VBG");
    words.insert("has", "VBZ");
    words.insert("had", "VBD");
    words.insert("does", "VBZ");
    words.insert("did", "VBD");
    words.insert("'ve", "VBP");
    words.insert("'ll", "MD");
    words.insert("'d", "MD");
    words
});

static VERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "accept", "access", "add", "allow", "analyze", "approve", "archive", "assign", "avoid",
        "book", "browse", "build", "buy", "calculate", "cancel", "change", "check", "choose",
        "close", "collect", "communicate", "compare", "configure", "confirm", "contact", "copy",
        "create", "customize", "define", "delete", "deploy", "display", "do", "document",
        "download", "edit", "enable", "ensure", "enter", "estimate", "export", "filter", "find",
        "follow", "get", "give", "go", "have", "help", "hide", "import", "improve", "increase",
        "install", "invite", "join", "keep", "know", "learn", "leave", "list", "load", "log",
        "login", "make", "manage", "mark", "merge", "modify", "monitor", "move", "need",
        "notify", "open", "order", "organize", "pay", "plan", "prevent", "print", "prioritize",
        "publish", "read", "receive", "record", "reduce", "refer", "register", "reject",
        "remove", "rename", "reply", "report", "request", "reset", "restore", "review", "run",
        "save", "schedule", "search", "see", "select", "sell", "send", "set", "share", "show",
        "sign", "sort", "specify", "start", "stop", "store", "submit", "subscribe", "support",
        "take", "test", "track", "understand", "update", "upload", "use", "validate", "verify",
        "view", "visit", "want", "wish", "write",
    ]
    .into_iter()
    .collect()
});

static ADJECTIVES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "able", "available", "basic", "clear", "complete", "current", "different", "easy",
        "existing", "external", "fast", "full", "good", "important", "internal", "large",
        "last", "main", "multiple", "new", "next", "old", "other", "personal", "possible",
        "previous", "public", "quick", "relevant", "same", "secure", "simple", "single",
        "small", "specific", "several", "various",
    ]
    .into_iter()
    .collect()
});

static ADVERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "again", "also", "already", "always", "easily", "even", "ever", "just", "later", "more",
        "never", "now", "often", "only", "quickly", "really", "still", "then", "very",
    ]
    .into_iter()
    .collect()
});

/// Built-in tagger that needs no external model.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleTagger;

impl RuleTagger {
    pub fn new() -> Self {
        Self
    }

    fn tag_tokens(&self, text: &str) -> Vec<TaggedToken> {
        let mut tagged: Vec<TaggedToken> = Vec::new();
        let mut sentence_start = true;
        for token in tokenize(text) {
            let prev: Vec<&str> = tagged
                .iter()
                .rev()
                .take(2)
                .map(|token| token.tag.as_str())
                .collect();
            let tag = tag_word(&token.text, &prev, sentence_start);
            sentence_start = tag == ".";
            tagged.push(TaggedToken {
                text: token.text,
                tag: tag.to_string(),
                span: Some(token.span),
            });
        }
        tagged
    }
}

impl Tagger for RuleTagger {
    fn tag(&self, text: &str) -> TaggerResult<TaggedText> {
        Ok(split_sentences(self.tag_tokens(text)))
    }
}

/// Tags one word given up to two previous tags (nearest first).
fn tag_word(word: &str, prev: &[&str], sentence_start: bool) -> &'static str {
    if let Some(tag) = punctuation_tag(word) {
        return tag;
    }
    if word.chars().all(|ch| ch.is_ascii_digit()) {
        return "CD";
    }

    let lower = word.to_lowercase();
    let lower = lower.as_str();
    let last = prev.first().copied();
    let before_last = prev.get(1).copied();

    if let Some(tag) = CLOSED_CLASS.get(lower).copied() {
        return tag;
    }
    if matches!(last, Some("TO" | "MD")) {
        return "VB";
    }
    if lower.len() > 4 && lower.ends_with("ing") {
        return "VBG";
    }

    let after_subject = match (last, before_last) {
        (Some("PRP"), _) => true,
        (Some("RB"), Some("PRP")) => true,
        _ => false,
    };
    if after_subject && VERBS.contains(lower) {
        return "VBP";
    }
    if after_subject && lower.len() > 3 && lower.ends_with("ed") {
        return "VBD";
    }

    let after_noun = matches!(last, Some("NN" | "NNS" | "NNP" | "PRP"));
    if after_noun && third_person_stem(lower).is_some_and(|stem| VERBS.contains(stem)) {
        return "VBZ";
    }
    if lower.len() > 3 && lower.ends_with("ed") {
        return if matches!(last, Some("VBZ" | "VBP" | "VBD" | "VB")) {
            "VBN"
        } else {
            "VBD"
        };
    }

    if ADJECTIVES.contains(lower) {
        return "JJ";
    }
    if ADVERBS.contains(lower) || (lower.len() > 4 && lower.ends_with("ly")) {
        return "RB";
    }

    let clause_start = sentence_start || matches!(last, None | Some("CC" | "," | ":" | "RB"));
    if clause_start && VERBS.contains(lower) {
        return "VB";
    }

    if word.chars().next().is_some_and(char::is_uppercase) {
        return "NNP";
    }
    if lower.len() > 3 && lower.ends_with('s') && !lower.ends_with("ss") {
        return "NNS";
    }
    "NN"
}

fn punctuation_tag(word: &str) -> Option<&'static str> {
    let tag = match word {
        "," => ",",
        "." | "?" | "!" => ".",
        ";" | ":" | "-" | "--" | "\u{2010}" | "\u{2012}" | "\u{2013}" | "\u{2014}" | "\u{2015}" => {
            ":"
        }
        "(" | "[" | "{" | "\u{27e8}" => "-LRB-",
        ")" | "]" | "}" | "\u{27e9}" => "-RRB-",
        "\"" | "``" | "\u{201c}" | "`" => "``",
        "''" | "\u{201d}" | "'" => "''",
        _ => return None,
    };
    Some(tag)
}

fn third_person_stem(word: &str) -> Option<&str> {
    if word.len() > 4 && word.ends_with("es") {
        let stem = &word[..word.len() - 2];
        if VERBS.contains(stem) {
            return Some(stem);
        }
    }
    if word.len() > 2 && word.ends_with('s') && !word.ends_with("ss") {
        return Some(&word[..word.len() - 1]);
    }
    None
}
