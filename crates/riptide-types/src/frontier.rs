use serde::{Deserialize, Serialize};

/// A pending crawl target: a URL at a given link depth, ordered by
/// ascending `priority` (lower value served first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub priority: i32,
    pub url: String,
    pub depth: u32,
}

impl FrontierEntry {
    pub fn new(priority: i32, url: impl Into<String>, depth: u32) -> Self {
        Self {
            priority: priority.clamp(1, 100),
            url: url.into(),
            depth,
        }
    }
}
