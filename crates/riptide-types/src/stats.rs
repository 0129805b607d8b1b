use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running counters for one crawl job. Cheap to `Clone` so readers can copy
/// a snapshot out from under the job mutex without holding it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub urls_processed: u64,
    pub indexed: u64,
    pub crawled: u64,
    pub errors: u64,
    pub robots_blocked: u64,
    pub skipped_duplicates: u64,
    pub frontier_size: usize,
    pub recent_urls: Vec<String>,
}

/// Per-domain aggregate used to bias crawl priority and ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainStats {
    pub domain: String,
    pub pages_count: u64,
    pub last_crawled: DateTime<Utc>,
    pub avg_page_size: f64,
    pub importance: f64,
}
