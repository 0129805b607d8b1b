//! Normalizes arbitrary text (or raw HTML) into an ordered sequence of
//! index terms: lowercase, split on non-word runs, drop single characters
//! and a fixed stop-word set. Order (and repeats) are preserved because the
//! Indexer needs per-term frequencies, not just a set.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;

static WORD_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").expect("valid regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "and", "or", "but", "is", "are", "in", "on", "of", "to", "for", "with",
    ]
    .into_iter()
    .collect()
});

/// Tokenize `text`, stripping HTML tags first if the input looks like
/// markup (a `<` immediately followed by an ASCII letter or `/`), matching
/// the HTML-stripping idiom used elsewhere in this codebase's indexing
/// pipeline.
pub fn tokenize(text: &str) -> Vec<String> {
    let plain = if looks_like_html(text) {
        strip_html(text)
    } else {
        text.to_string()
    };

    WORD_SPLIT
        .split(&plain)
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w.as_str()))
        .collect()
}

fn looks_like_html(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.windows(2).any(|pair| {
        pair[0] == b'<' && (pair[1].is_ascii_alphabetic() || pair[1] == b'/')
    })
}

fn strip_html(html: &str) -> String {
    let document = Html::parse_fragment(html);
    document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_on_punctuation() {
        let tokens = tokenize("Hello, World! Hello-there.");
        assert_eq!(tokens, vec!["hello", "world", "hello", "there"]);
    }

    #[test]
    fn drops_stop_words_and_single_chars() {
        let tokens = tokenize("the cat is on a mat");
        assert_eq!(tokens, vec!["cat", "mat"]);
    }

    #[test]
    fn strips_html_before_tokenizing() {
        let tokens = tokenize("<p>Hello <b>world</b></p>");
        assert_eq!(tokens, vec!["hello", "world"]);
    }

    #[test]
    fn plain_text_with_angle_bracket_comparison_is_not_treated_as_html() {
        let tokens = tokenize("1 < 2 is true");
        // No letter/slash follows '<', so this is not HTML-stripped.
        assert!(tokens.contains(&"true".to_string()));
    }

    #[test]
    fn is_idempotent_modulo_stop_words() {
        let text = "Hello world, hello again!";
        let once = tokenize(text);
        let twice = tokenize(&once.join(" "));
        assert_eq!(once, twice);
    }

    #[test]
    fn preserves_order_and_repeats() {
        let tokens = tokenize("rust rust programming rust");
        assert_eq!(tokens, vec!["rust", "rust", "programming", "rust"]);
    }
}
