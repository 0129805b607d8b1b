//! Idempotent schema creation, applied once inside a transaction on
//! [`crate::Store::open`].

pub const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT UNIQUE NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        domain TEXT NOT NULL DEFAULT '',
        indexed_date TEXT NOT NULL,
        last_updated TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active'
    )",
    "CREATE INDEX IF NOT EXISTS idx_documents_domain ON documents(domain)",
    "CREATE TABLE IF NOT EXISTS index_entries (
        word TEXT NOT NULL,
        doc_id INTEGER NOT NULL REFERENCES documents(id),
        frequency REAL NOT NULL,
        importance REAL NOT NULL,
        PRIMARY KEY (word, doc_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_index_entries_word ON index_entries(word)",
    "CREATE TABLE IF NOT EXISTS cache (
        url TEXT PRIMARY KEY,
        content BLOB NOT NULL,
        headers TEXT NOT NULL DEFAULT '{}',
        status_code INTEGER NOT NULL,
        timestamp TEXT NOT NULL,
        expiry TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS crawler_visits (
        url TEXT PRIMARY KEY,
        visit_date TEXT NOT NULL,
        depth INTEGER NOT NULL,
        success INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS compressed_content (
        doc_id INTEGER PRIMARY KEY REFERENCES documents(id),
        content BLOB NOT NULL,
        compression TEXT NOT NULL,
        original_size INTEGER NOT NULL,
        compressed_size INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS document_metadata (
        doc_id INTEGER NOT NULL REFERENCES documents(id),
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (doc_id, key)
    )",
    "CREATE TABLE IF NOT EXISTS content_fingerprints (
        fingerprint TEXT PRIMARY KEY,
        first_url TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS domain_stats (
        domain TEXT PRIMARY KEY,
        pages_count INTEGER NOT NULL DEFAULT 0,
        last_crawled TEXT NOT NULL,
        avg_page_size REAL NOT NULL DEFAULT 0,
        importance REAL NOT NULL DEFAULT 0
    )",
    "CREATE VIRTUAL TABLE IF NOT EXISTS fts_index USING fts5(
        content, title, url UNINDEXED, domain UNINDEXED
    )",
];
