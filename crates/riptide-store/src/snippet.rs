//! Snippet generation: pick the 100-char window of a document with the most
//! distinct query terms, then widen it to `max_len` characters of context.

const WINDOW_LEN: usize = 100;
const LEADING_CONTEXT: usize = 20;
const DEFAULT_MAX_LEN: usize = 160;

pub fn generate_snippet(body: &str, terms: &[String], max_len: Option<usize>) -> String {
    let max_len = max_len.unwrap_or(DEFAULT_MAX_LEN);
    let chars: Vec<char> = body.chars().collect();
    if chars.is_empty() || terms.is_empty() {
        return chars.into_iter().take(max_len).collect();
    }

    let lower: Vec<char> = chars.iter().map(|c| c.to_ascii_lowercase()).collect();
    let lowercase_terms: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();

    let mut best_start = 0usize;
    let mut best_count = -1i32;

    let step = if chars.len() > WINDOW_LEN { 1 } else { 0 };
    let mut start = 0usize;
    loop {
        let end = (start + WINDOW_LEN).min(chars.len());
        let window: String = lower[start..end].iter().collect();
        let count = lowercase_terms
            .iter()
            .filter(|term| !term.is_empty() && window.contains(term.as_str()))
            .count() as i32;

        if count > best_count {
            best_count = count;
            best_start = start;
        }

        if end >= chars.len() {
            break;
        }
        start += step.max(1);
    }

    let snippet_start = best_start.saturating_sub(LEADING_CONTEXT);
    let snippet_end = (snippet_start + max_len).min(chars.len());
    let mut snippet: String = chars[snippet_start..snippet_end].iter().collect();

    if snippet_start > 0 {
        snippet = format!("...{snippet}");
    }
    if snippet_end < chars.len() {
        snippet.push_str("...");
    }
    snippet
}
