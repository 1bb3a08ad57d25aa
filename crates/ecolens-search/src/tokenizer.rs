//! Snippet tokenizer
//!
//! Turns a raw code snippet into the set of tokens matched against entry
//! keywords. Two kinds of tokens are produced:
//!
//! - **Words**: maximal runs of word characters and hyphens that start and end
//!   with a word character, lowercased (`for-each`, `stringbuilder`, `i32`).
//! - **Operators**: whitespace-delimited pieces of one to three operator
//!   characters (`%`, `+=`, `&&`, `>>>`).
//!
//! Tokenization never fails; a snippet without matches yields an empty set.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w(?:[\w-]*\w)?").expect("word token regex"));

/// Characters an operator token may consist of
const OPERATOR_CHARS: &[char] = &[
    '+', '-', '*', '/', '%', '=', '?', ':', '&', '|', '^', '<', '>', '!',
];

/// Maximum operator token length in characters
const MAX_OPERATOR_LEN: usize = 3;

/// Extract the normalized token set from a snippet.
pub fn tokenize(snippet: &str) -> BTreeSet<String> {
    let lowered = snippet.to_lowercase();

    let mut tokens: BTreeSet<String> = words(&lowered).map(str::to_string).collect();

    tokens.extend(
        lowered
            .split_whitespace()
            .filter(|piece| is_operator(piece))
            .map(str::to_string),
    );

    tokens
}

/// Word tokens of `text` as written, without lowercasing.
///
/// `String.format` yields `String` and `format`; `i++` yields `i`.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    WORD_RE.find_iter(text).map(|m| m.as_str())
}

fn is_operator(piece: &str) -> bool {
    let len = piece.chars().count();
    (1..=MAX_OPERATOR_LEN).contains(&len) && piece.chars().all(|c| OPERATOR_CHARS.contains(&c))
}
