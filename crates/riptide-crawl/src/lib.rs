//! The Crawl Engine and its supporting machinery: the priority Frontier,
//! per-host rate limiting, HTML extraction, and state snapshots for resume.
//!
//! [`CrawlEngine`] is the only type most callers need; the rest of this
//! crate is exposed so an embedder can drive the Frontier or snapshot
//! machinery directly (e.g. an admin surface that wants to peek at queue
//! depth without going through the engine).

mod engine;
mod extract;
mod frontier;
mod ratelimit;
mod snapshot;

pub use engine::{CrawlEngine, EngineStatus};
pub use extract::{
    extract_links, extract_main_text, extract_meta, extract_structured_data, extract_title,
};
pub use frontier::{
    compute_priority, is_crawlable_link, path_segment_count, query_param_count, Frontier,
    FrontierSnapshot, PopOutcome,
};
pub use ratelimit::RateLimiter;
pub use snapshot::{load as load_snapshot, save as save_snapshot, JobSnapshot};
