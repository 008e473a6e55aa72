use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_KEYWORD_LIMIT: usize = 14;

// `+ . # -` stay inside tokens so "c++", "node.js" and "c#" survive
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9][a-z0-9+.#-]*").unwrap());

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "all", "also", "an", "and", "any", "are", "as",
    "at", "be", "been", "being", "both", "but", "by", "can", "could", "do", "does", "each",
    "etc", "for", "from", "get", "had", "has", "have", "help", "how", "if", "in", "into", "is",
    "it", "its", "join", "just", "like", "looking", "make", "may", "more", "most", "must", "new",
    "not", "of", "on", "one", "or", "other", "our", "out", "over", "per", "plus", "role", "should",
    "so", "some", "such", "than", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "those", "through", "to", "up", "us", "use", "using", "very", "was", "we",
    "well", "were", "what", "when", "where", "which", "while", "who", "why", "will", "with",
    "within", "work", "working", "would", "year", "years", "you", "your", "ability", "able",
    "including", "strong", "team", "experience", "job", "company", "candidate", "responsibilities",
    "requirements", "required", "preferred", "qualifications", "skills",
];

/// Top `limit` words of `text` by frequency, lowercase, stop-words removed.
/// Ties keep first-seen order.
pub fn top_keywords(text: &str, limit: usize) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();

    for (position, token) in tokens(&lower).enumerate() {
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(word, ..)| word.to_string())
        .collect()
}

/// Lowercase tokens of already-lowercased text, in order, minus stop-words,
/// bare numbers and single characters.
fn tokens(lower: &str) -> impl Iterator<Item = &str> {
    TOKEN
        .find_iter(lower)
        .map(|m| m.as_str().trim_end_matches(['.', '-']))
        .filter(|word| word.chars().count() > 1)
        .filter(|word| !word.chars().all(|c| c.is_ascii_digit()))
        .filter(|word| !STOP_WORDS.contains(word))
}

/// Whether `keyword` occurs in `text` as a whole token.
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    let lower = text.to_lowercase();
    tokens(&lower).any(|token| token == keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JD: &str = "We need Rust and Python engineers. Rust services, Python tooling, \
                      and C++ interop. Experience with Node.js and C# is a plus. Rust!";

    #[test]
    fn test_top_keywords_orders_by_frequency() {
        let keywords = top_keywords(JD, 3);
        assert_eq!(keywords, vec!["rust", "python", "need"]);
    }

    #[test]
    fn test_symbols_are_kept_in_tokens() {
        let keywords = top_keywords(JD, DEFAULT_KEYWORD_LIMIT);
        assert!(keywords.contains(&"c++".to_string()));
        assert!(keywords.contains(&"node.js".to_string()));
        assert!(keywords.contains(&"c#".to_string()));
    }

    #[test]
    fn test_stop_words_never_returned() {
        let keywords = top_keywords("the the the and and with rust", 10);
        assert_eq!(keywords, vec!["rust"]);
        for keyword in top_keywords(JD, 50) {
            assert!(!STOP_WORDS.contains(&keyword.as_str()), "{keyword} is a stop word");
        }
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let keywords = top_keywords("kafka docker terraform docker kafka terraform", 3);
        assert_eq!(keywords, vec!["kafka", "docker", "terraform"]);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let first = top_keywords(JD, DEFAULT_KEYWORD_LIMIT);
        for _ in 0..10 {
            assert_eq!(top_keywords(JD, DEFAULT_KEYWORD_LIMIT), first);
        }
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(top_keywords("", 5).is_empty());
        assert!(top_keywords("2024 a b", 5).is_empty());
    }

    #[test]
    fn test_contains_keyword_matches_whole_tokens() {
        assert!(contains_keyword("Shipped Node.js services.", "node.js"));
        assert!(!contains_keyword("JavaScript", "java"));
    }
}
