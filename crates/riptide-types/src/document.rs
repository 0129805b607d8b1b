use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Document`]. Tombstoned rows are kept for audit but
/// excluded from `doc_count` and from search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Active,
    Tombstoned,
}

/// A single indexed page, keyed by `url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub body: String,
    pub domain: String,
    pub indexed_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub status: DocumentStatus,
}

/// An `(term, doc_id)` posting in the inverted index.
///
/// `frequency` is the term count in the document normalized by document
/// length; `importance` is a static boost, 1.5 for terms that also occur in
/// the title, 1.0 otherwise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: i64,
    pub frequency: f64,
    pub importance: f64,
}

/// Terminal record of a URL the crawler handled, successfully or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub url: String,
    pub visited_at: DateTime<Utc>,
    pub depth: u32,
    pub success: bool,
}

/// A cached raw HTTP response, bounded by `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub body: Vec<u8>,
    pub headers_json: String,
    pub status_code: u16,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A `(key, value)` row in the global metadata table, e.g. `doc_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
