//! Converts `(url, title, body, metadata)` into a [`Document`] plus its
//! term-frequency postings, the content-classification dispatch, and
//! (on the enhanced path) FTS + compressed-content + domain-stats updates.

use std::collections::HashMap;

use riptide_store::Store;
pub use riptide_types::ContentKind;
use riptide_types::StoreError;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Everything the Indexer needs about one crawled page.
#[derive(Debug, Clone)]
pub struct IndexInput {
    pub url: String,
    pub title: String,
    pub body: String,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

pub struct Indexer {
    store: Store,
    /// Enable the enhanced path: FTS indexing + compressed storage + domain
    /// stats. Disabled in cheap/test setups where only postings matter.
    enhanced: bool,
}

impl Indexer {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            enhanced: true,
        }
    }

    pub fn with_enhanced(mut self, enhanced: bool) -> Self {
        self.enhanced = enhanced;
        self
    }

    /// Index one page. Returns `None` on a no-op (missing url or empty
    /// body), or when the page's [`ContentKind`] is not indexable — only
    /// `Webpage` runs through the full pipeline; other kinds are accepted
    /// purely as classification input for a caller's own media/news
    /// handling.
    pub async fn add(&self, input: IndexInput) -> Result<Option<i64>, StoreError> {
        if input.url.is_empty() || input.body.trim().is_empty() {
            return Ok(None);
        }

        let kind = input
            .content_type
            .as_deref()
            .map(ContentKind::from_content_type)
            .unwrap_or(ContentKind::Webpage);

        if !kind.is_indexable() {
            debug!(url = %input.url, ?kind, "content kind not indexable, skipping");
            return Ok(None);
        }

        self.index_webpage(input).await
    }

    async fn index_webpage(&self, input: IndexInput) -> Result<Option<i64>, StoreError> {
        let domain = input
            .metadata
            .get("domain")
            .cloned()
            .unwrap_or_else(|| domain_of(&input.url));

        let doc_id = self
            .store
            .add_document(&input.url, &input.title, &input.body, &domain)
            .await?;

        let title_terms: std::collections::HashSet<String> =
            riptide_tokenizer::tokenize(&input.title).into_iter().collect();

        let combined = format!("{} {}", input.title, input.body);
        let tokens = riptide_tokenizer::tokenize(&combined);
        let total = tokens.len().max(1) as f64;

        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in &tokens {
            *counts.entry(term.clone()).or_insert(0) += 1;
        }

        let postings: HashMap<String, (f64, f64)> = counts
            .into_iter()
            .map(|(term, count)| {
                let frequency = count as f64 / total;
                let importance = if title_terms.contains(&term) { 1.5 } else { 1.0 };
                (term, (frequency, importance))
            })
            .collect();

        self.store.replace_postings(doc_id, &postings).await?;

        if self.enhanced {
            self.store
                .index_fts(&input.url, &input.title, &input.body, &domain)
                .await?;
            self.store
                .store_compressed_content(doc_id, &domain, &input.body)
                .await?;
        }

        for (key, value) in &input.metadata {
            self.store.set_document_metadata(doc_id, key, value).await?;
        }

        debug!(doc_id, url = %input.url, terms = postings.len(), "indexed");
        Ok(Some(doc_id))
    }
}

/// 128-bit fingerprint over normalized text with the title double-weighted,
/// used to detect near-exact duplicate content across distinct URLs.
pub fn fingerprint(title: &str, body: &str) -> String {
    let normalized = format!(
        "{}::{}",
        riptide_tokenizer::tokenize(title).join(" "),
        riptide_tokenizer::tokenize(body).join(" ")
    );
    let weighted = format!("{title}::{title}::{normalized}");
    let digest = Sha256::digest(weighted.as_bytes());
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fresh_indexer() -> Indexer {
        let store = Store::open_in_memory().await.unwrap();
        Indexer::new(store)
    }

    fn input(url: &str, title: &str, body: &str) -> IndexInput {
        IndexInput {
            url: url.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            content_type: Some("text/html".to_string()),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn indexes_webpage_and_returns_doc_id() {
        let indexer = fresh_indexer().await;
        let doc_id = indexer
            .add(input("http://h/a", "T", "Hello world hello"))
            .await
            .unwrap();
        assert!(doc_id.is_some());
    }

    #[tokio::test]
    async fn title_terms_get_importance_boost() {
        let indexer = fresh_indexer().await;
        indexer
            .add(input("http://h/a", "python", "x"))
            .await
            .unwrap();
        let (rows, _) = indexer
            .store
            .search_postings(&["python".to_string()], 1, 10, None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn empty_body_is_a_no_op() {
        let indexer = fresh_indexer().await;
        let doc_id = indexer.add(input("http://h/a", "T", "   ")).await.unwrap();
        assert!(doc_id.is_none());
    }

    #[tokio::test]
    async fn non_webpage_content_kind_is_skipped() {
        let indexer = fresh_indexer().await;
        let mut page = input("http://h/a.png", "T", "binary junk");
        page.content_type = Some("image/png".to_string());
        let doc_id = indexer.add(page).await.unwrap();
        assert!(doc_id.is_none());
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive_to_content() {
        let a = fingerprint("T", "hello world");
        let b = fingerprint("T", "hello world");
        let c = fingerprint("T", "goodbye world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
