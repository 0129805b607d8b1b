//! Query pipeline: tokenize, retrieve (hybrid with a postings fallback),
//! filter, rank, enhance, and cache.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use riptide_store::{generate_snippet, Store};
use riptide_types::ContentKind;
use tracing::debug;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_PAGE_SIZE: u32 = 10;
const SNIPPET_MAX_LEN: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Relevance,
    Date,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Relevance
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub page: u32,
    pub page_size: u32,
    pub max_indexed_at: Option<DateTime<Utc>>,
    pub content_kind: Option<ContentKind>,
    pub sort: SortOrder,
}

impl QueryOptions {
    fn normalized(&self) -> (u32, u32) {
        let page = self.page.max(1);
        let page_size = if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        };
        (page, page_size)
    }

    fn cache_key(&self, query: &str) -> String {
        format!(
            "{query}|{:?}|{:?}|{:?}",
            self.max_indexed_at, self.content_kind, self.sort
        )
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub indexed_at: DateTime<Utc>,
    pub score: f64,
    pub snippet: String,
    pub favicon: String,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub results: Vec<SearchResult>,
    pub total: i64,
}

struct CacheEntry {
    cached_at: Instant,
    result: QueryResult,
}

/// Evaluates a query against the store and caches the result for
/// [`DEFAULT_CACHE_TTL`], the same "concurrent map keyed by a composite, no
/// external cache server" idiom this codebase uses for per-host state.
pub struct Ranker {
    store: Store,
    cache: DashMap<String, CacheEntry>,
    cache_ttl: Duration,
}

impl Ranker {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub async fn query(
        &self,
        query: &str,
        options: QueryOptions,
    ) -> Result<QueryResult, riptide_types::StoreError> {
        let terms = riptide_tokenizer::tokenize(query);
        if terms.is_empty() {
            return Ok(QueryResult::default());
        }

        // Every indexed document is a webpage (the indexer skips everything
        // else), so a content-kind filter for anything but `Webpage` can
        // never match and a filter for `Webpage` is a no-op.
        if matches!(options.content_kind, Some(kind) if kind != ContentKind::Webpage) {
            return Ok(QueryResult::default());
        }

        let (page, page_size) = options.normalized();
        let cache_key = format!("{}|p{page}|s{page_size}", options.cache_key(query));

        if let Some(entry) = self.cache.get(&cache_key) {
            if entry.cached_at.elapsed() < self.cache_ttl {
                debug!(query, "query cache hit");
                return Ok(entry.result.clone());
            }
        }

        let query_expr = terms.join(" OR ");
        let (mut rows, total) = self
            .store
            .hybrid_search(&terms, &query_expr, page, page_size)
            .await?;

        if rows.is_empty() {
            let (fallback_rows, fallback_total) = self
                .store
                .search_postings(&terms, page, page_size, options.max_indexed_at)
                .await?;
            rows = fallback_rows;
            if total == 0 {
                return Ok(QueryResult {
                    results: Vec::new(),
                    total: fallback_total,
                });
            }
        }

        if options.sort == SortOrder::Date {
            rows.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        }

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let snippet = match row.snippet {
                Some(s) => s,
                None => {
                    let body = self.store.document_body(row.doc_id).await?.unwrap_or_default();
                    generate_snippet(&body, &terms, Some(SNIPPET_MAX_LEN))
                }
            };
            results.push(SearchResult {
                favicon: format!("https://{}/favicon.ico", row.domain),
                url: row.url,
                title: row.title,
                domain: row.domain,
                indexed_at: row.indexed_at,
                score: row.score,
                snippet,
            });
        }

        let result = QueryResult { results, total };
        self.cache.insert(
            cache_key,
            CacheEntry {
                cached_at: Instant::now(),
                result: result.clone(),
            },
        );
        Ok(result)
    }

    /// TF-IDF fallback scoring over an in-memory corpus, used when the
    /// store's own postings aggregation is unavailable (e.g. a bare
    /// in-memory index in tests). `corpus` is `(doc_id, title, body)`.
    pub fn score_in_memory(query: &str, corpus: &[(i64, String, String)]) -> Vec<(i64, f64)> {
        let query_terms = riptide_tokenizer::tokenize(query);
        if query_terms.is_empty() || corpus.is_empty() {
            return Vec::new();
        }

        let n = corpus.len() as f64;
        let doc_tokens: Vec<(i64, Vec<String>, std::collections::HashSet<String>)> = corpus
            .iter()
            .map(|(id, title, body)| {
                let combined = format!("{title} {body}");
                let tokens = riptide_tokenizer::tokenize(&combined);
                let title_terms: std::collections::HashSet<String> =
                    riptide_tokenizer::tokenize(title).into_iter().collect();
                (*id, tokens, title_terms)
            })
            .collect();

        let mut scores: Vec<(i64, f64)> = Vec::with_capacity(doc_tokens.len());
        for (doc_id, tokens, title_terms) in &doc_tokens {
            let doc_len = tokens.len().max(1) as f64;
            let mut score = 0.0;
            for term in &query_terms {
                let count = tokens.iter().filter(|t| *t == term).count() as f64;
                if count == 0.0 {
                    continue;
                }
                let tf = count / doc_len;
                let df = doc_tokens
                    .iter()
                    .filter(|(_, toks, _)| toks.contains(term))
                    .count() as f64;
                let idf = (1.0 + n / (1.0 + df)).ln();
                score += tf * idf;
                if title_terms.contains(term) {
                    score += 0.5;
                }
            }
            scores.push((*doc_id, score));
        }

        scores.retain(|(_, score)| *score > 0.0);
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_index::{IndexInput, Indexer};
    use std::collections::HashMap;

    async fn seeded_ranker() -> Ranker {
        let store = Store::open_in_memory().await.unwrap();
        let indexer = Indexer::new(store.clone());
        indexer
            .add(IndexInput {
                url: "http://h/a".to_string(),
                title: "T".to_string(),
                body: "Hello world hello".to_string(),
                content_type: Some("text/html".to_string()),
                metadata: HashMap::new(),
            })
            .await
            .unwrap();
        Ranker::new(store)
    }

    #[tokio::test]
    async fn empty_query_returns_empty_result() {
        let ranker = seeded_ranker().await;
        let result = ranker.query("", QueryOptions::default()).await.unwrap();
        assert_eq!(result.total, 0);
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn matches_are_returned_with_snippet_and_favicon() {
        let ranker = seeded_ranker().await;
        let result = ranker.query("hello", QueryOptions::default()).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.results[0].favicon, "https://h/favicon.ico");
        assert!(!result.results[0].snippet.is_empty());
    }

    #[tokio::test]
    async fn repeated_query_is_served_from_cache() {
        let ranker = seeded_ranker().await;
        let first = ranker.query("hello", QueryOptions::default()).await.unwrap();
        let second = ranker.query("hello", QueryOptions::default()).await.unwrap();
        assert_eq!(first.total, second.total);
    }

    #[test]
    fn title_boost_outranks_body_only_match() {
        let corpus = vec![
            (1i64, "python".to_string(), "x".to_string()),
            (2i64, "x".to_string(), "python python".to_string()),
        ];
        let scores = Ranker::score_in_memory("python", &corpus);
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|(_, s)| *s > 0.0), "both docs should score positive");
        assert_eq!(scores[0].0, 1, "title match should outrank body-only match");
    }
}
