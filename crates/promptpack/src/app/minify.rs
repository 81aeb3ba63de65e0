//! Lossy compaction of source text for code dumps.
//!
//! This is a best-effort transform driven by regular expressions. It does not understand string
//! literals, so comment markers inside strings can be stripped and the result is not guaranteed
//! to remain valid code.

use once_cell::sync::Lazy;
use regex::Regex;

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
// `//` at line start or after whitespace, so `http://` survives.
static SLASH_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)(^|[ \t])//.*$").unwrap());
// `#` followed by whitespace or end of line; keeps `#[attr]`, `#include`, `#!shebang`.
static HASH_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#([ \t].*)?$").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static AROUND_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*([{}()\[\];,])[ \t]*").unwrap());

/// Strip comments, collapse whitespace and blank lines, and tighten spacing around brackets.
pub fn minify(source: &str) -> String {
    let text = BLOCK_COMMENT.replace_all(source, "");
    let text = SLASH_COMMENT.replace_all(&text, "$1");
    let text = HASH_COMMENT.replace_all(&text, "");
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    let text = AROUND_PUNCT.replace_all(&text, "$1");

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
