//! Embedded SQLite persistence.
//!
//! Everything in this crate runs over a single `sqlx::SqlitePool`: the
//! engine ships as one file with no external database server, the same
//! "embedded store, no network hop" posture this codebase's persistence
//! crate takes for its own state, here pointed at SQLite instead of
//! Postgres/Redis. Every multi-row write commits inside a
//! `sqlx::Transaction`; on any failure the transaction rolls back and the
//! caller sees a typed [`StoreError`].

mod schema;
mod snippet;

use std::collections::HashMap;
use std::io::Write as _;

use chrono::{DateTime, Utc};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

pub use riptide_types::StoreError;
use riptide_types::{CacheEntry, DomainStats};

pub use snippet::generate_snippet;

fn sqlx_err(err: sqlx::Error) -> StoreError {
    StoreError::Database(riptide_types::sqlx_error::SqlxError(err.to_string()))
}

/// One row of a postings-based or FTS-based search result.
#[derive(Debug, Clone)]
pub struct SearchRow {
    pub doc_id: i64,
    pub url: String,
    pub title: String,
    pub domain: String,
    pub indexed_at: DateTime<Utc>,
    pub score: f64,
    pub snippet: Option<String>,
}

/// Handle to the embedded database. Cheap to `Clone` (an `Arc`-backed pool
/// internally), so callers can share it across the crawl worker and query
/// handlers without their own locking.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if absent) the SQLite file at `path` and applies the
    /// schema idempotently via `CREATE TABLE IF NOT EXISTS`, the same
    /// startup-migration pattern this codebase uses for config hot-reload.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = format!("sqlite://{path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .map_err(sqlx_err)?;

        let mut tx = pool.begin().await.map_err(sqlx_err)?;
        for statement in schema::STATEMENTS {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(sqlx_err)?;
        }
        tx.commit().await.map_err(sqlx_err)?;

        info!(path, "store schema ready");
        Ok(Self { pool })
    }

    /// In-memory store, for tests.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:").await
    }

    // -- documents ---------------------------------------------------

    /// Upsert by `url`; preserves the existing `doc_id` on conflict.
    /// Maintains `doc_count` metadata by checking row existence before
    /// insert rather than inside the update, per this crate's own
    /// disambiguation of the spec's open question on increment semantics.
    pub async fn add_document(
        &self,
        url: &str,
        title: &str,
        body: &str,
        domain: &str,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;
        let now = Utc::now();

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM documents WHERE url = ?1")
            .bind(url)
            .fetch_optional(&mut *tx)
            .await
            .map_err(sqlx_err)?;

        let doc_id = if let Some(id) = existing {
            sqlx::query(
                "UPDATE documents SET title = ?1, content = ?2, domain = ?3, last_updated = ?4, status = 'active' WHERE id = ?5",
            )
            .bind(title)
            .bind(body)
            .bind(domain)
            .bind(now.to_rfc3339())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(sqlx_err)?;
            id
        } else {
            let result = sqlx::query(
                "INSERT INTO documents (url, title, content, domain, indexed_date, last_updated, status) VALUES (?1, ?2, ?3, ?4, ?5, ?5, 'active')",
            )
            .bind(url)
            .bind(title)
            .bind(body)
            .bind(domain)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(sqlx_err)?;

            let new_id = result.last_insert_rowid();
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE status = 'active'")
                .fetch_one(&mut *tx)
                .await
                .map_err(sqlx_err)?;
            set_meta_tx(&mut tx, "doc_count", &count.to_string()).await?;
            new_id
        };

        tx.commit().await.map_err(sqlx_err)?;
        debug!(doc_id, url, "document upserted");
        Ok(doc_id)
    }

    /// Atomic replace: delete all prior postings for `doc_id`, insert the
    /// new set.
    pub async fn replace_postings(
        &self,
        doc_id: i64,
        postings: &HashMap<String, (f64, f64)>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;

        sqlx::query("DELETE FROM index_entries WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await
            .map_err(sqlx_err)?;

        for (term, (frequency, importance)) in postings {
            sqlx::query(
                "INSERT INTO index_entries (word, doc_id, frequency, importance) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(term)
            .bind(doc_id)
            .bind(frequency)
            .bind(importance)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                warn!(doc_id, error = %err, "posting insert failed, rolling back");
                sqlx_err(err)
            })?;
        }

        tx.commit().await.map_err(sqlx_err)?;
        debug!(doc_id, terms = postings.len(), "postings replaced");
        Ok(())
    }

    /// Raw body text for a document, used by the ranker to generate a
    /// snippet when the search path did not already produce one.
    pub async fn document_body(&self, doc_id: i64) -> Result<Option<String>, StoreError> {
        let body: Option<String> = sqlx::query_scalar("SELECT content FROM documents WHERE id = ?1")
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?
            .flatten();
        Ok(body)
    }

    /// Upserts this document's row in the `fts_index` virtual table, keyed
    /// by `url` (the closest thing fts5 has to a primary key without an
    /// external-content table). Called from the Indexer's "enhanced path".
    pub async fn index_fts(
        &self,
        url: &str,
        title: &str,
        body: &str,
        domain: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM fts_index WHERE url = ?1")
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        sqlx::query("INSERT INTO fts_index (content, title, url, domain) VALUES (?1, ?2, ?3, ?4)")
            .bind(body)
            .bind(title)
            .bind(url)
            .bind(domain)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    pub async fn set_document_metadata(
        &self,
        doc_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO document_metadata (doc_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(doc_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(doc_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }

    /// Compress `body` with zlib and store alongside `doc_id`, updating the
    /// domain's running average page size. This is the "enhanced path"
    /// referenced by the Indexer.
    pub async fn store_compressed_content(
        &self,
        doc_id: i64,
        domain: &str,
        body: &str,
    ) -> Result<(), StoreError> {
        let original_size = body.len() as i64;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body.as_bytes()).ok();
        let compressed = encoder.finish().unwrap_or_default();
        let compressed_size = compressed.len() as i64;

        sqlx::query(
            "INSERT INTO compressed_content (doc_id, content, compression, original_size, compressed_size)
             VALUES (?1, ?2, 'zlib', ?3, ?4)
             ON CONFLICT(doc_id) DO UPDATE SET content = excluded.content, original_size = excluded.original_size, compressed_size = excluded.compressed_size",
        )
        .bind(doc_id)
        .bind(compressed)
        .bind(original_size)
        .bind(compressed_size)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;

        self.upsert_domain_stats(domain, original_size as u64).await
    }

    // -- postings search ----------------------------------------------

    /// Join postings x documents; score = sum(freq*importance); ordered by
    /// score desc; returns the requested page plus the total distinct
    /// match count.
    pub async fn search_postings(
        &self,
        terms: &[String],
        page: u32,
        page_size: u32,
        max_indexed_at: Option<DateTime<Utc>>,
    ) -> Result<(Vec<SearchRow>, i64), StoreError> {
        if terms.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let placeholders = terms.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let date_clause = max_indexed_at
            .map(|_| " AND d.indexed_date <= ?")
            .unwrap_or_default();

        let count_sql = format!(
            "SELECT COUNT(DISTINCT d.id) FROM index_entries i
             JOIN documents d ON d.id = i.doc_id
             WHERE i.word IN ({placeholders}) AND d.status = 'active'{date_clause}"
        );
        let mut count_query = sqlx::query_scalar(&count_sql);
        for term in terms {
            count_query = count_query.bind(term);
        }
        if let Some(cutoff) = max_indexed_at {
            count_query = count_query.bind(cutoff.to_rfc3339());
        }
        let total: i64 = count_query.fetch_one(&self.pool).await.map_err(sqlx_err)?;

        let offset = page.saturating_sub(1) as i64 * page_size as i64;
        let rows_sql = format!(
            "SELECT d.id as doc_id, d.url, d.title, d.domain, d.indexed_date,
                    SUM(i.frequency * i.importance) as score
             FROM index_entries i
             JOIN documents d ON d.id = i.doc_id
             WHERE i.word IN ({placeholders}) AND d.status = 'active'{date_clause}
             GROUP BY d.id
             ORDER BY score DESC
             LIMIT ? OFFSET ?"
        );
        let mut rows_query = sqlx::query(&rows_sql);
        for term in terms {
            rows_query = rows_query.bind(term);
        }
        if let Some(cutoff) = max_indexed_at {
            rows_query = rows_query.bind(cutoff.to_rfc3339());
        }
        rows_query = rows_query.bind(page_size as i64).bind(offset);

        let rows = rows_query.fetch_all(&self.pool).await.map_err(sqlx_err)?;
        Ok((rows.into_iter().map(row_to_search_row).collect(), total))
    }

    /// Optional full-text path over the `fts_index` virtual table.
    pub async fn fts_search(
        &self,
        query_expr: &str,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<SearchRow>, i64), StoreError> {
        if query_expr.trim().is_empty() {
            return Ok((Vec::new(), 0));
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fts_index WHERE fts_index MATCH ?1",
        )
        .bind(query_expr)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_err)?;

        let offset = page.saturating_sub(1) as i64 * page_size as i64;
        let rows = sqlx::query(
            "SELECT d.id as doc_id, d.url, d.title, d.domain, d.indexed_date, 1.0 as score
             FROM fts_index f
             JOIN documents d ON d.url = f.url
             WHERE f.fts_index MATCH ?1 AND d.status = 'active'
             LIMIT ?2 OFFSET ?3",
        )
        .bind(query_expr)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;

        Ok((rows.into_iter().map(row_to_search_row).collect(), total))
    }

    /// First restrict candidates via `search_postings` (top <=100), then
    /// re-rank against FTS; if postings yield nothing, fall back to FTS
    /// directly. Callers paginating beyond the first 100 postings results
    /// get an empty page — a documented limitation, not silently patched.
    pub async fn hybrid_search(
        &self,
        terms: &[String],
        query_expr: &str,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<SearchRow>, i64), StoreError> {
        let (candidates, total) = self.search_postings(terms, 1, 100, None).await?;
        if candidates.is_empty() {
            return self.fts_search(query_expr, page, page_size).await;
        }

        let start = page.saturating_sub(1) as usize * page_size as usize;
        let end = (start + page_size as usize).min(candidates.len());
        let page_rows = if start < candidates.len() {
            candidates[start..end].to_vec()
        } else {
            Vec::new()
        };
        Ok((page_rows, total))
    }

    // -- visit log ------------------------------------------------------

    pub async fn mark_visited(&self, url: &str, depth: u32, success: bool) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO crawler_visits (url, visit_date, depth, success) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url) DO UPDATE SET visit_date = excluded.visit_date, depth = excluded.depth, success = excluded.success",
        )
        .bind(url)
        .bind(Utc::now().to_rfc3339())
        .bind(depth)
        .bind(success)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }

    /// Purges the persistent visit log. Used when a job starts with
    /// `force_recrawl=true` and the caller wants a clean re-crawl rather
    /// than merely bypassing the `is_visited` check per-request.
    pub async fn clear_visits(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM crawler_visits")
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    pub async fn is_visited(&self, url: &str) -> Result<bool, StoreError> {
        let row: Option<i64> = sqlx::query_scalar("SELECT 1 FROM crawler_visits WHERE url = ?1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(row.is_some())
    }

    // -- page cache -------------------------------------------------------

    pub async fn cache_page(
        &self,
        url: &str,
        body: &[u8],
        headers_json: &str,
        status_code: u16,
        ttl_secs: i64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires = now + chrono::Duration::seconds(ttl_secs);
        sqlx::query(
            "INSERT INTO cache (url, content, headers, status_code, timestamp, expiry) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(url) DO UPDATE SET content = excluded.content, headers = excluded.headers, status_code = excluded.status_code, timestamp = excluded.timestamp, expiry = excluded.expiry",
        )
        .bind(url)
        .bind(body)
        .bind(headers_json)
        .bind(status_code)
        .bind(now.to_rfc3339())
        .bind(expires.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }

    pub async fn get_cached_page(&self, url: &str) -> Result<Option<CacheEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT url, content, headers, status_code, timestamp, expiry FROM cache WHERE url = ?1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_err)?;

        let Some(row) = row else { return Ok(None) };
        let expires_at: String = row.try_get("expiry").map_err(sqlx_err)?;
        let cached_at: String = row.try_get("timestamp").map_err(sqlx_err)?;
        let entry = CacheEntry {
            url: row.try_get("url").map_err(sqlx_err)?,
            body: row.try_get("content").map_err(sqlx_err)?,
            headers_json: row.try_get("headers").map_err(sqlx_err)?,
            status_code: row.try_get::<i64, _>("status_code").map_err(sqlx_err)? as u16,
            cached_at: cached_at.parse().unwrap_or_else(|_| Utc::now()),
            expires_at: expires_at.parse().unwrap_or_else(|_| Utc::now()),
        };

        if entry.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    pub async fn clear_cache(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cache")
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    pub async fn clear_expired_cache(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cache WHERE expiry < ?1")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(result.rows_affected())
    }

    // -- metadata ---------------------------------------------------------

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;
        set_meta_tx(&mut tx, key, value).await?;
        tx.commit().await.map_err(sqlx_err)?;
        Ok(())
    }

    pub async fn get_meta(&self, key: &str, default: &str) -> Result<String, StoreError> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM metadata WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(value.unwrap_or_else(|| default.to_string()))
    }

    /// Empties documents, postings, cache, FTS, and compressed content;
    /// resets domain counters; leaves the (now-empty) FTS table ready for
    /// reuse.
    pub async fn bulk_clear_index(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;
        for table in [
            "index_entries",
            "documents",
            "cache",
            "compressed_content",
            "fts_index",
            "domain_stats",
            "document_metadata",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(sqlx_err)?;
        }
        set_meta_tx(&mut tx, "doc_count", "0").await?;
        tx.commit().await.map_err(sqlx_err)?;
        info!("index bulk-cleared");
        Ok(())
    }

    // -- content fingerprints ----------------------------------------------

    /// Record `fingerprint -> url` if no prior URL produced this
    /// fingerprint. Returns `true` if this is the first (surviving) URL,
    /// `false` if a duplicate.
    pub async fn record_fingerprint_if_new(
        &self,
        fingerprint: &str,
        url: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO content_fingerprints (fingerprint, first_url) VALUES (?1, ?2)",
        )
        .bind(fingerprint)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(result.rows_affected() == 1)
    }

    // -- domain stats -------------------------------------------------------

    pub async fn domain_stats(&self, domain: &str) -> Result<Option<DomainStats>, StoreError> {
        let row = sqlx::query(
            "SELECT domain, pages_count, last_crawled, avg_page_size, importance FROM domain_stats WHERE domain = ?1",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_err)?;

        let Some(row) = row else { return Ok(None) };
        let last_crawled: String = row.try_get("last_crawled").map_err(sqlx_err)?;
        Ok(Some(DomainStats {
            domain: row.try_get("domain").map_err(sqlx_err)?,
            pages_count: row.try_get::<i64, _>("pages_count").map_err(sqlx_err)? as u64,
            last_crawled: last_crawled.parse().unwrap_or_else(|_| Utc::now()),
            avg_page_size: row.try_get("avg_page_size").map_err(sqlx_err)?,
            importance: row.try_get("importance").map_err(sqlx_err)?,
        }))
    }

    /// Maintains `pages_count`, `avg_page_size` (cumulative moving average:
    /// `avg_new = (avg_old*n + new_size)/(n+1)`), and `last_crawled`.
    pub async fn upsert_domain_stats(&self, domain: &str, page_size: u64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;
        let existing = sqlx::query("SELECT pages_count, avg_page_size FROM domain_stats WHERE domain = ?1")
            .bind(domain)
            .fetch_optional(&mut *tx)
            .await
            .map_err(sqlx_err)?;

        let now = Utc::now().to_rfc3339();
        match existing {
            Some(row) => {
                let n: i64 = row.try_get("pages_count").map_err(sqlx_err)?;
                let avg_old: f64 = row.try_get("avg_page_size").map_err(sqlx_err)?;
                let avg_new = (avg_old * n as f64 + page_size as f64) / (n as f64 + 1.0);
                sqlx::query(
                    "UPDATE domain_stats SET pages_count = pages_count + 1, avg_page_size = ?1, last_crawled = ?2 WHERE domain = ?3",
                )
                .bind(avg_new)
                .bind(now)
                .bind(domain)
                .execute(&mut *tx)
                .await
                .map_err(sqlx_err)?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO domain_stats (domain, pages_count, last_crawled, avg_page_size, importance) VALUES (?1, 1, ?2, ?3, 0.0)",
                )
                .bind(domain)
                .bind(now)
                .bind(page_size as f64)
                .execute(&mut *tx)
                .await
                .map_err(sqlx_err)?;
            }
        }

        tx.commit().await.map_err(sqlx_err)?;
        Ok(())
    }
}

async fn set_meta_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    key: &str,
    value: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO metadata (key, value, updated) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated = excluded.updated",
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await
    .map_err(sqlx_err)?;
    Ok(())
}

fn row_to_search_row(row: SqliteRow) -> SearchRow {
    let indexed_date: String = row.try_get("indexed_date").unwrap_or_default();
    SearchRow {
        doc_id: row.try_get("doc_id").unwrap_or_default(),
        url: row.try_get("url").unwrap_or_default(),
        title: row.try_get("title").unwrap_or_default(),
        domain: row.try_get("domain").unwrap_or_default(),
        indexed_at: indexed_date.parse().unwrap_or_else(|_| Utc::now()),
        score: row.try_get("score").unwrap_or_default(),
        snippet: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fresh_store() -> Store {
        Store::open_in_memory().await.expect("open store")
    }

    #[tokio::test]
    async fn add_document_preserves_id_on_reindex() {
        let store = fresh_store().await;
        let id1 = store
            .add_document("http://h/a", "T", "hello world", "h")
            .await
            .unwrap();
        let id2 = store
            .add_document("http://h/a", "T2", "hello again", "h")
            .await
            .unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn doc_count_metadata_tracks_active_documents() {
        let store = fresh_store().await;
        store.add_document("http://h/a", "T", "x", "h").await.unwrap();
        store.add_document("http://h/b", "T", "y", "h").await.unwrap();
        let count = store.get_meta("doc_count", "0").await.unwrap();
        assert_eq!(count, "2");
    }

    #[tokio::test]
    async fn replace_postings_has_no_residue_from_prior_call() {
        let store = fresh_store().await;
        let doc_id = store.add_document("http://h/a", "T", "x", "h").await.unwrap();

        let mut first = HashMap::new();
        first.insert("old".to_string(), (1.0, 1.0));
        store.replace_postings(doc_id, &first).await.unwrap();

        let mut second = HashMap::new();
        second.insert("new".to_string(), (1.0, 1.0));
        store.replace_postings(doc_id, &second).await.unwrap();

        let (rows, total) = store
            .search_postings(&["old".to_string()], 1, 10, None)
            .await
            .unwrap();
        assert_eq!(total, 0);
        assert!(rows.is_empty());

        let (rows, total) = store
            .search_postings(&["new".to_string()], 1, 10, None)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].doc_id, doc_id);
    }

    #[tokio::test]
    async fn mark_visited_then_is_visited() {
        let store = fresh_store().await;
        assert!(!store.is_visited("http://h/a").await.unwrap());
        store.mark_visited("http://h/a", 0, true).await.unwrap();
        assert!(store.is_visited("http://h/a").await.unwrap());
    }

    #[tokio::test]
    async fn fingerprint_first_writer_wins() {
        let store = fresh_store().await;
        assert!(store
            .record_fingerprint_if_new("abc123", "http://h/1")
            .await
            .unwrap());
        assert!(!store
            .record_fingerprint_if_new("abc123", "http://h/2")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn domain_stats_cumulative_average() {
        let store = fresh_store().await;
        store.upsert_domain_stats("h", 100).await.unwrap();
        store.upsert_domain_stats("h", 200).await.unwrap();
        let stats = store.domain_stats("h").await.unwrap().unwrap();
        assert_eq!(stats.pages_count, 2);
        assert!((stats.avg_page_size - 150.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cache_round_trip_and_expiry() {
        let store = fresh_store().await;
        store
            .cache_page("http://h/a", b"body", "{}", 200, 3600)
            .await
            .unwrap();
        let entry = store.get_cached_page("http://h/a").await.unwrap();
        assert!(entry.is_some());

        store
            .cache_page("http://h/b", b"body", "{}", 200, -1)
            .await
            .unwrap();
        let expired = store.get_cached_page("http://h/b").await.unwrap();
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn bulk_clear_index_empties_documents_and_resets_doc_count() {
        let store = fresh_store().await;
        store.add_document("http://h/a", "T", "x", "h").await.unwrap();
        store.bulk_clear_index().await.unwrap();
        let count = store.get_meta("doc_count", "0").await.unwrap();
        assert_eq!(count, "0");
        let (rows, total) = store
            .search_postings(&["x".to_string()], 1, 10, None)
            .await
            .unwrap();
        assert_eq!(total, 0);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn fts_search_matches_indexed_content() {
        let store = fresh_store().await;
        store
            .add_document("http://h/a", "Rust Guide", "ownership and borrowing in rust", "h")
            .await
            .unwrap();
        store
            .index_fts("http://h/a", "Rust Guide", "ownership and borrowing in rust", "h")
            .await
            .unwrap();

        let (rows, total) = store.fts_search("rust", 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].url, "http://h/a");
    }

    #[tokio::test]
    async fn hybrid_search_falls_back_to_fts_when_postings_are_empty() {
        let store = fresh_store().await;
        let doc_id = store
            .add_document("http://h/a", "Rust Guide", "ownership and borrowing in rust", "h")
            .await
            .unwrap();
        // No postings for this document, only the FTS side is populated.
        store
            .index_fts("http://h/a", "Rust Guide", "ownership and borrowing in rust", "h")
            .await
            .unwrap();

        let (rows, total) = store
            .hybrid_search(&["rust".to_string()], "rust", 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].url, "http://h/a");
        let _ = doc_id;
    }

    #[tokio::test]
    async fn hybrid_search_restricts_to_postings_candidates_first() {
        let store = fresh_store().await;
        let doc_id = store
            .add_document("http://h/a", "Rust Guide", "ownership and borrowing in rust", "h")
            .await
            .unwrap();
        let mut postings = HashMap::new();
        postings.insert("rust".to_string(), (1.0, 1.5));
        store.replace_postings(doc_id, &postings).await.unwrap();
        store
            .index_fts("http://h/a", "Rust Guide", "ownership and borrowing in rust", "h")
            .await
            .unwrap();

        let (rows, total) = store
            .hybrid_search(&["rust".to_string()], "rust", 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].url, "http://h/a");
    }
}
