//! Save/restore of everything needed to resume a crawl job: frontier state,
//! per-host rate limiter timestamps, and running stats.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::Duration;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use riptide_types::CrawlStats;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::frontier::FrontierSnapshot;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub frontier: FrontierSnapshot,
    pub stats: CrawlStats,
    /// Host -> seconds since snapshot epoch when that host was last
    /// accessed, so the rate limiter can be rehydrated without leaking
    /// wall-clock `Instant`s across a process restart.
    pub host_last_access_secs_ago: HashMap<String, f64>,
}

/// Gzip-compresses the JSON-serialized snapshot and writes it to `path`.
/// Never panics: any I/O or serialization failure is logged and reported
/// as `false`.
pub fn save(path: &str, snapshot: &JobSnapshot) -> bool {
    match try_save(path, snapshot) {
        Ok(()) => true,
        Err(err) => {
            warn!(path, error = %err, "failed to save crawl snapshot");
            false
        }
    }
}

fn try_save(path: &str, snapshot: &JobSnapshot) -> std::io::Result<()> {
    let json = serde_json::to_vec(snapshot)?;
    let file = std::fs::File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&json)?;
    encoder.finish()?;
    info!(path, "crawl snapshot saved");
    Ok(())
}

/// Restores a snapshot from `path`. Returns `None` if the file is missing
/// or corrupt — the caller falls back to a fresh crawl in that case.
pub fn load(path: &str) -> Option<JobSnapshot> {
    match try_load(path) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(path, error = %err, "failed to load crawl snapshot");
            None
        }
    }
}

fn try_load(path: &str) -> std::io::Result<JobSnapshot> {
    let file = std::fs::File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    let snapshot = serde_json::from_slice(&json)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    Ok(snapshot)
}

pub fn seconds_ago(duration_since: Duration) -> f64 {
    duration_since.as_secs_f64()
}
