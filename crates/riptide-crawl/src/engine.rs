//! The Crawl Engine: pop -> gate -> fetch -> parse -> index -> enqueue
//! children, wrapped in lifecycle control, a heartbeat, and a supervisor.
//!
//! The drain loop is a blanket-catch domain by design: every stage is a
//! `match` over a `Result`, never a `?` that would abort the worker task.
//! No fetch/parse/store fault is allowed to end the job; each maps to a
//! counter and/or an emitted event instead, mirroring this codebase's own
//! posture that exceptions never become crawl-loop control flow.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use riptide_config::CrawlerSettings;
use riptide_events::{CrawlEvent, EventSink, EventStatus};
use riptide_fetch::{is_html_content_type, is_transient_status, FetchOptions, Fetcher};
use riptide_index::{fingerprint, IndexInput, Indexer};
use riptide_robots::{RobotsConfig, RobotsOracle};
use riptide_store::Store;
use riptide_types::{CrawlStats, FrontierEntry};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::extract;
use crate::frontier::{self, Frontier, PopOutcome};
use crate::ratelimit::RateLimiter;
use crate::snapshot::{self, JobSnapshot};

const POP_TIMEOUT: Duration = Duration::from_millis(500);
const HEARTBEAT_EVERY_N_ITERATIONS: u32 = 10;
const SUPERVISOR_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_STALE_SECS: i64 = 60;
const FORCE_STOP_TIMEOUT: Duration = Duration::from_secs(30);
const RECENT_URLS_CAP: usize = 5;
const DEFAULT_SOURCE_PAGE_IMPORTANCE: i32 = 5;
const TRANSIENT_RETRY_BACKOFFS_MS: &[u64] = &[100, 200];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Running,
    Stopping,
    Stopped,
    Completed,
    Terminated,
    Error,
    Reset,
}

struct JobState {
    status: EngineStatus,
    stats: CrawlStats,
    max_depth: u32,
    force_recrawl: bool,
}

/// Top-level crawl job coordinator. One `CrawlEngine` runs at most one job
/// at a time (`start()` refuses to run concurrently with itself).
pub struct CrawlEngine {
    store: Store,
    frontier: Arc<Frontier>,
    rate_limiter: Arc<RateLimiter>,
    robots: Arc<RobotsOracle>,
    fetcher: Arc<Fetcher>,
    indexer: Arc<Indexer>,
    events: Arc<dyn EventSink>,
    settings: CrawlerSettings,
    job: Arc<Mutex<JobState>>,
    heartbeat_unix_secs: Arc<AtomicI64>,
    iteration_count: Arc<AtomicU32>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl CrawlEngine {
    pub fn new(store: Store, settings: CrawlerSettings, events: Arc<dyn EventSink>) -> Self {
        let fetcher = Fetcher::new(&FetchOptions {
            user_agent: settings.user_agent.clone(),
            total_timeout: Duration::from_secs(settings.request_timeout_secs),
            verify_tls: settings.verify_tls,
            ..FetchOptions::default()
        });
        let robots = RobotsOracle::new(RobotsConfig {
            user_agent: settings.user_agent.clone(),
            ..RobotsConfig::default()
        });
        let indexer = Indexer::new(store.clone());

        Self {
            store,
            frontier: Arc::new(Frontier::new()),
            rate_limiter: Arc::new(RateLimiter::new(Duration::from_secs_f64(
                settings.min_crawl_delay,
            ))),
            robots: Arc::new(robots),
            fetcher: Arc::new(fetcher),
            indexer: Arc::new(indexer),
            events,
            settings,
            job: Arc::new(Mutex::new(JobState {
                status: EngineStatus::Idle,
                stats: CrawlStats::default(),
                max_depth: 3,
                force_recrawl: false,
            })),
            heartbeat_unix_secs: Arc::new(AtomicI64::new(0)),
            iteration_count: Arc::new(AtomicU32::new(0)),
            worker: Arc::new(Mutex::new(None)),
            supervisor: Mutex::new(None),
        }
    }

    pub async fn status(&self) -> EngineStatus {
        self.job.lock().await.status
    }

    pub async fn stats(&self) -> CrawlStats {
        self.job.lock().await.stats.clone()
    }

    /// Refuses to start a second job while one is already running.
    /// `resume=true` restores a prior snapshot instead of requiring
    /// `seed_url`.
    pub async fn start(
        &self,
        seed_url: Option<String>,
        max_depth: u32,
        resume: bool,
        force_recrawl: bool,
        snapshot_path: Option<&str>,
    ) -> bool {
        {
            let mut job = self.job.lock().await;
            if job.status == EngineStatus::Running || job.status == EngineStatus::Stopping {
                warn!("refusing to start: a crawl job is already running");
                return false;
            }

            if resume {
                let restored = snapshot_path.and_then(snapshot::load);
                match restored {
                    Some(snapshot) => {
                        self.apply_snapshot(snapshot).await;
                    }
                    None => {
                        warn!("resume requested but snapshot is missing or corrupt; starting fresh");
                    }
                }
            } else {
                let Some(seed) = seed_url else {
                    warn!("start requires a seed_url when resume=false");
                    return false;
                };
                job.stats = CrawlStats::default();
                self.frontier.clear().await;
                if force_recrawl {
                    if let Err(err) = self.store.clear_visits().await {
                        warn!(error = %err, "failed to purge visit log for force_recrawl");
                    }
                }
                self.frontier
                    .push(FrontierEntry::new(1, seed, 0))
                    .await;
            }

            job.max_depth = max_depth.max(1);
            job.force_recrawl = force_recrawl;
            job.status = EngineStatus::Running;
        }

        self.heartbeat_unix_secs
            .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
        self.iteration_count.store(0, Ordering::Relaxed);

        self.events
            .emit(CrawlEvent::new(EventStatus::Started))
            .await;

        let worker_handle = tokio::spawn(run_worker(self.worker_deps()));
        *self.worker.lock().await = Some(worker_handle);

        let supervisor_handle = tokio::spawn(run_supervisor(self.worker_deps()));
        *self.supervisor.lock().await = Some(supervisor_handle);

        true
    }

    /// Cooperative stop: flips status to `stopping`, snapshots state, and
    /// arms a force-stop timer racing graceful completion.
    pub async fn stop(&self, snapshot_path: Option<&str>) {
        {
            let mut job = self.job.lock().await;
            if job.status != EngineStatus::Running {
                return;
            }
            job.status = EngineStatus::Stopping;
        }
        self.events
            .emit(CrawlEvent::new(EventStatus::Stopping))
            .await;

        if let Some(path) = snapshot_path {
            self.save_snapshot(path).await;
        }

        let worker = self.worker.lock().await.take();
        if let Some(handle) = worker {
            let race = tokio::time::timeout(FORCE_STOP_TIMEOUT, handle).await;
            if race.is_err() {
                warn!("graceful stop timed out, forcing");
                self.force_stop().await;
                return;
            }
        }

        let mut job = self.job.lock().await;
        job.status = EngineStatus::Stopped;
        drop(job);
        self.events
            .emit(CrawlEvent::new(EventStatus::Stopped))
            .await;
    }

    /// Immediately clears `is_running` without waiting for the worker; any
    /// in-flight fetch still completes, its result simply discarded.
    pub async fn force_stop(&self) {
        {
            let mut job = self.job.lock().await;
            job.status = EngineStatus::Stopped;
        }
        if let Some(handle) = self.worker.lock().await.take() {
            handle.abort();
        }
        self.events
            .emit(CrawlEvent::new(EventStatus::ForceStopped))
            .await;
    }

    pub async fn save_snapshot(&self, path: &str) -> bool {
        let frontier_snapshot = self.frontier.snapshot().await;
        let stats = self.stats().await;
        let job_snapshot = JobSnapshot {
            frontier: frontier_snapshot,
            stats,
            host_last_access_secs_ago: self.rate_limiter.snapshot_last_access_secs_ago(),
        };
        snapshot::save(path, &job_snapshot)
    }

    async fn apply_snapshot(&self, job_snapshot: JobSnapshot) {
        self.frontier.restore(job_snapshot.frontier).await;
        for (host, secs_ago) in &job_snapshot.host_last_access_secs_ago {
            self.rate_limiter.seed_last_access(host, *secs_ago);
        }
        self.job.lock().await.stats = job_snapshot.stats;
    }

    fn worker_deps(&self) -> WorkerDeps {
        WorkerDeps {
            store: self.store.clone(),
            frontier: self.frontier.clone(),
            rate_limiter: self.rate_limiter.clone(),
            robots: self.robots.clone(),
            fetcher: self.fetcher.clone(),
            indexer: self.indexer.clone(),
            events: self.events.clone(),
            job: self.job.clone(),
            heartbeat_unix_secs: self.heartbeat_unix_secs.clone(),
            iteration_count: self.iteration_count.clone(),
            domain_importance: self.settings.domain_importance.clone(),
            max_urls_per_run: self.settings.max_urls_per_run,
            worker: self.worker.clone(),
        }
    }
}

#[derive(Clone)]
struct WorkerDeps {
    store: Store,
    frontier: Arc<Frontier>,
    rate_limiter: Arc<RateLimiter>,
    robots: Arc<RobotsOracle>,
    fetcher: Arc<Fetcher>,
    indexer: Arc<Indexer>,
    events: Arc<dyn EventSink>,
    job: Arc<Mutex<JobState>>,
    heartbeat_unix_secs: Arc<AtomicI64>,
    iteration_count: Arc<AtomicU32>,
    domain_importance: std::collections::HashMap<String, i32>,
    max_urls_per_run: u64,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

async fn run_worker(deps: WorkerDeps) {
    let mut recent_urls: VecDeque<String> = VecDeque::with_capacity(RECENT_URLS_CAP);

    loop {
        {
            let job = deps.job.lock().await;
            if job.status == EngineStatus::Stopping {
                break;
            }
        }

        let popped = deps.frontier.pop(POP_TIMEOUT).await;
        let entry = match popped {
            PopOutcome::Entry(entry) => entry,
            PopOutcome::Timeout => {
                if deps.frontier.is_empty().await {
                    break;
                }
                continue;
            }
        };

        process_one(&deps, entry, &mut recent_urls).await;

        let iterations = deps.iteration_count.fetch_add(1, Ordering::Relaxed) + 1;
        if iterations % HEARTBEAT_EVERY_N_ITERATIONS == 0 {
            deps.heartbeat_unix_secs
                .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
        }

        let frontier_size = deps.frontier.size().await;
        let mut job = deps.job.lock().await;
        job.stats.urls_processed += 1;
        job.stats.frontier_size = frontier_size;
        let urls_processed = job.stats.urls_processed;
        drop(job);

        if urls_processed >= deps.max_urls_per_run {
            let mut job = deps.job.lock().await;
            job.status = EngineStatus::Terminated;
            let stats = job.stats.clone();
            drop(job);
            info!(urls_processed, "safety cap reached, terminating job");
            deps.events
                .emit(CrawlEvent::new(EventStatus::Terminated).with_stats(stats))
                .await;
            return;
        }

        let stats = deps.job.lock().await.stats.clone();
        deps.events
            .emit(CrawlEvent::new(EventStatus::Progress).with_stats(stats))
            .await;
    }

    let mut job = deps.job.lock().await;
    if job.status == EngineStatus::Running {
        job.status = EngineStatus::Completed;
    }
    let status = job.status;
    let stats = job.stats.clone();
    drop(job);

    let final_event = match status {
        EngineStatus::Completed => CrawlEvent::new(EventStatus::Completed),
        _ => CrawlEvent::new(EventStatus::Stopped),
    };
    deps.events.emit(final_event.with_stats(stats)).await;
}

/// One pass of the drain loop's steps 3-16 for a single popped entry.
async fn process_one(deps: &WorkerDeps, entry: FrontierEntry, recent_urls: &mut VecDeque<String>) {
    let FrontierEntry { url, depth, .. } = entry;

    let force_recrawl = deps.job.lock().await.force_recrawl;

    if deps.frontier.is_visited_in_memory(&url).await {
        return;
    }
    if !force_recrawl {
        match deps.store.is_visited(&url).await {
            Ok(true) => {
                deps.frontier.mark_visited(&url).await;
                return;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(url, error = %err, "store.is_visited failed, proceeding as unvisited");
            }
        }
    }

    if !deps.robots.is_allowed(&url).await {
        deps.frontier.mark_visited(&url).await;
        let _ = deps.store.mark_visited(&url, depth, false).await;
        let mut job = deps.job.lock().await;
        job.stats.robots_blocked += 1;
        drop(job);
        debug!(url, "robots disallowed");
        return;
    }

    if let Some(crawl_delay) = deps.robots.crawl_delay_for(&url).await {
        if let Some(host) = host_of(&url) {
            deps.rate_limiter
                .raise_min_delay(&host, Duration::from_secs_f64(crawl_delay));
        }
    }

    let Some(host) = host_of(&url) else {
        warn!(url, "could not parse host, marking visited and skipping");
        deps.frontier.mark_visited(&url).await;
        return;
    };
    deps.rate_limiter.wait(&host).await;

    let response = fetch_with_transient_retry(&deps.fetcher, &url).await;

    if response.status != 200 {
        deps.frontier.mark_visited(&url).await;
        let _ = deps.store.mark_visited(&url, depth, false).await;
        let mut job = deps.job.lock().await;
        job.stats.errors += 1;
        drop(job);
        warn!(url, status = response.status, "fetch did not return 200");
        return;
    }

    let content_type = response
        .headers
        .get("content-type")
        .cloned()
        .unwrap_or_default();
    if !is_html_content_type(&content_type) {
        deps.frontier.mark_visited(&url).await;
        let _ = deps.store.mark_visited(&url, depth, true).await;
        let mut job = deps.job.lock().await;
        job.stats.crawled += 1;
        drop(job);
        return;
    }

    let title = extract::extract_title(&response.body);
    let body_text = extract::extract_main_text(&response.body);

    let fp = fingerprint(&title, &body_text);
    let is_new = deps
        .store
        .record_fingerprint_if_new(&fp, &url)
        .await
        .unwrap_or(true);
    if !is_new {
        deps.frontier.mark_visited(&url).await;
        let _ = deps.store.mark_visited(&url, depth, true).await;
        let mut job = deps.job.lock().await;
        job.stats.skipped_duplicates += 1;
        job.stats.crawled += 1;
        drop(job);
        debug!(url, "duplicate content fingerprint, skipping");
        return;
    }
    deps.frontier.record_fingerprint(&fp, &url).await;

    let mut metadata = extract::extract_meta(&response.body);
    if let Some(structured) = extract::extract_structured_data(&response.body) {
        metadata.insert("structured_data".to_string(), structured.to_string());
    }

    let index_input = IndexInput {
        url: url.clone(),
        title,
        body: body_text,
        content_type: Some(content_type),
        metadata,
    };

    match deps.indexer.add(index_input).await {
        Ok(Some(_doc_id)) => {
            let mut job = deps.job.lock().await;
            job.stats.indexed += 1;
            job.stats.crawled += 1;
            drop(job);
        }
        Ok(None) => {
            let mut job = deps.job.lock().await;
            job.stats.crawled += 1;
            drop(job);
        }
        Err(err) => {
            error!(url, error = %err, "indexing failed");
            let mut job = deps.job.lock().await;
            job.stats.errors += 1;
            drop(job);
        }
    }

    let _ = deps.store.mark_visited(&url, depth, true).await;
    deps.frontier.mark_visited(&url).await;

    if recent_urls.len() == RECENT_URLS_CAP {
        recent_urls.pop_front();
    }
    recent_urls.push_back(url.clone());
    {
        let mut job = deps.job.lock().await;
        job.stats.recent_urls = recent_urls.iter().cloned().collect();
    }

    let max_depth = deps.job.lock().await.max_depth;
    if depth < max_depth {
        let links = extract::extract_links(&response.body, &url);
        let child_entries: Vec<FrontierEntry> = links
            .into_iter()
            .filter(|link| frontier::is_crawlable_link(link))
            .map(|link| {
                // domain_importance biases priority toward the *link's own*
                // host, not the source page's — an important domain should
                // jump the queue regardless of which page linked to it.
                let link_domain_bias = host_of(&link)
                    .and_then(|h| deps.domain_importance.get(&h).copied())
                    .unwrap_or(0);
                let priority = frontier::compute_priority(
                    depth + 1,
                    link_domain_bias,
                    frontier::query_param_count(&link),
                    frontier::path_segment_count(&link),
                    DEFAULT_SOURCE_PAGE_IMPORTANCE,
                );
                FrontierEntry::new(priority, link, depth + 1)
            })
            .collect();
        deps.frontier.push_links(child_entries).await;
    }
}

async fn fetch_with_transient_retry(fetcher: &Fetcher, url: &str) -> riptide_fetch::FetchResponse {
    let mut response = fetcher.fetch(url).await;
    for backoff_ms in TRANSIENT_RETRY_BACKOFFS_MS {
        if !is_transient_status(response.status) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(*backoff_ms)).await;
        response = fetcher.fetch(url).await;
    }
    response
}

/// Checks every [`SUPERVISOR_INTERVAL`] for two failure modes the worker
/// itself cannot report on its own: a stale heartbeat (worker alive but
/// wedged) and a dead worker task (panicked or otherwise finished) while
/// the job still claims `Running` — the `SupervisorFault` class in
/// SPEC_FULL.md §7. The latter forces a reset rather than merely warning,
/// since there is no worker left to ever reach a terminal state on its own.
async fn run_supervisor(deps: WorkerDeps) {
    let mut interval = tokio::time::interval(SUPERVISOR_INTERVAL);
    loop {
        interval.tick().await;
        let status = deps.job.lock().await.status;
        if status != EngineStatus::Running {
            break;
        }

        let worker_dead = deps
            .worker
            .lock()
            .await
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true);

        if worker_dead {
            warn!("worker task is dead but job status is still running, forcing reset");
            let mut job = deps.job.lock().await;
            job.status = EngineStatus::Reset;
            let stats = job.stats.clone();
            drop(job);
            *deps.worker.lock().await = None;
            deps.events
                .emit(CrawlEvent::new(EventStatus::Reset).with_stats(stats))
                .await;
            break;
        }

        let last_heartbeat = deps.heartbeat_unix_secs.load(Ordering::Relaxed);
        let now = chrono::Utc::now().timestamp();
        let stale_for = now - last_heartbeat;

        if stale_for > HEARTBEAT_STALE_SECS {
            warn!(stale_for, "worker heartbeat stale");
            deps.events
                .emit(
                    CrawlEvent::new(EventStatus::Warning)
                        .with_message("worker heartbeat stale"),
                )
                .await;
        }
    }
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}
