use std::sync::LazyLock;

use regex::Regex;

static HYPHEN_WRAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([[:alnum:]])-\n([[:alnum:]])").unwrap());
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Canonicalizes scraped or uploaded text: drops carriage returns, rejoins
/// hyphenated line wraps, collapses 3+ newlines to a blank line and trims.
pub fn normalize(text: &str) -> String {
    let mut text = text.replace('\r', "");

    // "a-\nb-\nc" needs two passes since matches may not overlap
    while HYPHEN_WRAP.is_match(&text) {
        text = HYPHEN_WRAP.replace_all(&text, "$1$2").into_owned();
    }

    BLANK_RUN.replace_all(&text, "\n\n").trim().to_string()
}

/// First `limit` characters of `text`, never splitting a code point.
pub fn take_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
