use thiserror::Error;

/// Errors surfaced directly to callers of [`Store`](https://docs.rs/riptide-store) APIs.
/// A transaction failure always rolls back before this is returned.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx_error::SqlxError),

    #[error("document not found for url {0}")]
    DocumentNotFound(String),

    #[error("transaction rolled back: {0}")]
    TransactionFailed(String),
}

/// Narrow wrapper so `riptide-types` does not need to depend on `sqlx`
/// itself; `riptide-store` converts its own `sqlx::Error` into this.
pub mod sqlx_error {
    use std::fmt;

    #[derive(Debug)]
    pub struct SqlxError(pub String);

    impl fmt::Display for SqlxError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for SqlxError {}
}

/// Failure performing a single HTTP GET. Never propagates past the Crawl
/// Engine: every variant is recorded as a failed [`Visit`](crate::Visit)
/// and the loop continues.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("TLS error fetching {url}: {message}")]
    Tls { url: String, message: String },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("non-success status {status} fetching {url}")]
    NonSuccess { url: String, status: u16 },
}

/// Any failure inside robots.txt handling. Always treated as permissive
/// (`allowed = true`) by the caller; this type exists purely so the
/// decision is logged with a reason.
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("failed to parse url {0}")]
    InvalidUrl(String),

    #[error("robots.txt fetch failed for {host}: {message}")]
    FetchFailed { host: String, message: String },
}

/// Top-level error composed at the Crawl Engine boundary. Each variant
/// maps to a stats counter and/or an emitted event; none of them abort
/// the drain loop.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error(transparent)]
    Robots(#[from] RobotsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("worker supervisor fault: {0}")]
    SupervisorFault(String),

    #[error("budget exhausted: processed {processed} urls (limit {limit})")]
    BudgetExhausted { processed: u64, limit: u64 },
}
