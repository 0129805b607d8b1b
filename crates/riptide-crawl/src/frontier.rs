//! Priority queue of pending crawl targets.
//!
//! Backed by a `tokio::sync::Mutex<BinaryHeap<...>>` of ascending-priority
//! entries — the same inversion trick (`Ord` reversed so a max-heap serves
//! ascending order) this codebase's best-first frontier queue uses,
//! simplified from its multi-tier variant down to the single
//! ascending-priority model this crate needs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use riptide_types::FrontierEntry;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

const MAX_LINKS_PER_PAGE: usize = 100;
const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".zip", ".exe", ".doc", ".docx",
];

/// Whether `url` is eligible to be pushed onto the Frontier at all, before
/// priority and visited-state are even considered.
pub fn is_crawlable_link(url: &str) -> bool {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return false;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let lower = path.to_ascii_lowercase();
    !EXCLUDED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// `p = depth*10 - domain_importance + query_param_count + floor(path_segment_count/2) - source_page_importance`,
/// clamped to `[1, 100]`. Shallow pages beat deep ones; important domains
/// jump the queue; noisy, parameter-heavy URLs are deferred.
pub fn compute_priority(
    depth: u32,
    domain_importance: i32,
    query_param_count: i32,
    path_segment_count: i32,
    source_page_importance: i32,
) -> i32 {
    let p = depth as i32 * 10 - domain_importance + query_param_count
        + (path_segment_count / 2)
        - source_page_importance;
    p.clamp(1, 100)
}

pub fn query_param_count(url: &str) -> i32 {
    url.split('?')
        .nth(1)
        .map(|q| q.split('&').filter(|s| !s.is_empty()).count() as i32)
        .unwrap_or(0)
}

pub fn path_segment_count(url: &str) -> i32 {
    url::Url::parse(url)
        .ok()
        .map(|parsed| {
            parsed
                .path_segments()
                .map(|segments| segments.filter(|s| !s.is_empty()).count() as i32)
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
struct HeapEntry {
    priority: i32,
    seq: u64,
    entry: FrontierEntry,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    /// Reversed so `BinaryHeap` (a max-heap) serves the lowest priority
    /// (and, for ties, the earliest-inserted entry) first.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
pub enum PopOutcome {
    Entry(FrontierEntry),
    Timeout,
}

struct State {
    heap: std::collections::BinaryHeap<HeapEntry>,
    visited: HashSet<String>,
    fingerprints: HashMap<String, String>,
}

/// Snapshot-friendly view of everything the Frontier owns, used by
/// [`crate::snapshot`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrontierSnapshot {
    pub entries: Vec<FrontierEntry>,
    pub visited: Vec<String>,
    pub fingerprints: HashMap<String, String>,
}

pub struct Frontier {
    state: Mutex<State>,
    seq: AtomicU64,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                heap: std::collections::BinaryHeap::new(),
                visited: HashSet::new(),
                fingerprints: HashMap::new(),
            }),
            seq: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    pub async fn push(&self, entry: FrontierEntry) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.state.lock().await;
            state.heap.push(HeapEntry {
                priority: entry.priority,
                seq,
                entry,
            });
        }
        self.notify.notify_one();
    }

    /// Push up to [`MAX_LINKS_PER_PAGE`] of `entries`, skipping any whose
    /// url is already in the in-memory visited set.
    pub async fn push_links(&self, entries: impl IntoIterator<Item = FrontierEntry>) {
        let mut pushed = 0usize;
        for entry in entries {
            if pushed >= MAX_LINKS_PER_PAGE {
                break;
            }
            if self.is_visited_in_memory(&entry.url).await {
                continue;
            }
            self.push(entry).await;
            pushed += 1;
        }
    }

    pub async fn pop(&self, timeout: Duration) -> PopOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(item) = state.heap.pop() {
                    return PopOutcome::Entry(item.entry);
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return PopOutcome::Timeout;
            }
            tokio::select! {
                _ = self.notify.notified() => continue,
                _ = tokio::time::sleep(remaining) => return PopOutcome::Timeout,
            }
        }
    }

    pub async fn size(&self) -> usize {
        self.state.lock().await.heap.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.size().await == 0
    }

    pub async fn mark_visited(&self, url: &str) {
        self.state.lock().await.visited.insert(url.to_string());
    }

    pub async fn is_visited_in_memory(&self, url: &str) -> bool {
        self.state.lock().await.visited.contains(url)
    }

    /// Records `fingerprint -> url` if unseen. Returns `true` if this is a
    /// newly recorded (surviving) fingerprint, `false` if a duplicate.
    pub async fn record_fingerprint(&self, fingerprint: &str, url: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.fingerprints.contains_key(fingerprint) {
            false
        } else {
            state.fingerprints.insert(fingerprint.to_string(), url.to_string());
            true
        }
    }

    pub async fn snapshot(&self) -> FrontierSnapshot {
        let state = self.state.lock().await;
        FrontierSnapshot {
            entries: state.heap.iter().map(|item| item.entry.clone()).collect(),
            visited: state.visited.iter().cloned().collect(),
            fingerprints: state.fingerprints.clone(),
        }
    }

    pub async fn restore(&self, snapshot: FrontierSnapshot) {
        let mut state = self.state.lock().await;
        state.heap.clear();
        for entry in snapshot.entries {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            state.heap.push(HeapEntry {
                priority: entry.priority,
                seq,
                entry,
            });
        }
        state.visited = snapshot.visited.into_iter().collect();
        state.fingerprints = snapshot.fingerprints;
        drop(state);
        self.notify.notify_waiters();
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.heap.clear();
        state.visited.clear();
        state.fingerprints.clear();
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pops_lowest_priority_first() {
        let frontier = Frontier::new();
        frontier.push(FrontierEntry::new(50, "http://h/b", 0)).await;
        frontier.push(FrontierEntry::new(1, "http://h/a", 0)).await;
        frontier.push(FrontierEntry::new(25, "http://h/c", 0)).await;

        let first = frontier.pop(Duration::from_millis(10)).await;
        match first {
            PopOutcome::Entry(entry) => assert_eq!(entry.url, "http://h/a"),
            PopOutcome::Timeout => panic!("expected an entry"),
        }
    }

    #[tokio::test]
    async fn ties_broken_by_insertion_order() {
        let frontier = Frontier::new();
        frontier.push(FrontierEntry::new(5, "http://h/first", 0)).await;
        frontier.push(FrontierEntry::new(5, "http://h/second", 0)).await;

        let first = frontier.pop(Duration::from_millis(10)).await;
        match first {
            PopOutcome::Entry(entry) => assert_eq!(entry.url, "http://h/first"),
            PopOutcome::Timeout => panic!("expected an entry"),
        }
    }

    #[tokio::test]
    async fn pop_on_empty_queue_times_out() {
        let frontier = Frontier::new();
        let outcome = frontier.pop(Duration::from_millis(20)).await;
        assert!(matches!(outcome, PopOutcome::Timeout));
    }

    #[tokio::test]
    async fn snapshot_round_trips_all_state() {
        let frontier = Frontier::new();
        frontier.push(FrontierEntry::new(1, "http://h/a", 0)).await;
        frontier.mark_visited("http://h/a").await;
        frontier.record_fingerprint("fp1", "http://h/a").await;

        let snap = frontier.snapshot().await;
        let restored = Frontier::new();
        restored.restore(snap).await;

        assert_eq!(restored.size().await, 1);
        assert!(restored.is_visited_in_memory("http://h/a").await);
        assert!(!restored.record_fingerprint("fp1", "http://h/b").await);
    }

    #[test]
    fn link_filter_rejects_non_http_and_excluded_extensions() {
        assert!(!is_crawlable_link("ftp://h/a"));
        assert!(!is_crawlable_link("http://h/doc.pdf"));
        assert!(is_crawlable_link("http://h/a?x=1"));
        assert!(!is_crawlable_link("http://h/doc.pdf?download=1"));
    }

    #[test]
    fn priority_is_clamped() {
        assert_eq!(compute_priority(0, 100, 0, 0, 0), 1);
        assert_eq!(compute_priority(50, 0, 0, 0, 0), 100);
    }

    #[test]
    fn query_param_count_counts_ampersand_segments() {
        assert_eq!(query_param_count("http://h/a?x=1&y=2"), 2);
        assert_eq!(query_param_count("http://h/a"), 0);
    }
}
