//! Event Sink: an abstract broadcaster for crawl progress/status messages.
//!
//! The Crawl Engine never knows about WebSocket clients or HTTP long-poll
//! consumers; it only calls [`EventSink::emit`]. Two implementations are
//! provided here: [`InMemorySink`] for tests, and [`BroadcastSink`] for a
//! real multi-consumer process, built on `tokio::sync::broadcast` the same
//! way the rest of this workspace fans events out to multiple handlers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

/// Status tag carried by every [`CrawlEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Welcome,
    Connected,
    Started,
    Crawling,
    Progress,
    Completed,
    Terminated,
    Stopping,
    Stopped,
    ForceStopped,
    Reset,
    Warning,
    Error,
    Test,
    Ping,
    Pong,
}

impl EventStatus {
    /// Ping/pong liveness traffic is delivered like any other event but
    /// filtered from log output.
    pub fn is_liveness(self) -> bool {
        matches!(self, EventStatus::Ping | EventStatus::Pong)
    }
}

/// A single progress/status message. Serializes to the JSON shape described
/// in the external interfaces: `status`, optional `url`/`stats`/`elapsed`/
/// `message`, and a unix-seconds `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlEvent {
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CrawlEvent {
    pub fn new(status: EventStatus) -> Self {
        Self {
            status,
            url: None,
            stats: None,
            elapsed: None,
            timestamp: Utc::now().timestamp(),
            message: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_stats(mut self, stats: impl Serialize) -> Self {
        self.stats = serde_json::to_value(stats).ok();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed = Some(elapsed_secs);
        self
    }

    pub fn at(now: DateTime<Utc>, status: EventStatus) -> Self {
        let mut event = Self::new(status);
        event.timestamp = now.timestamp();
        event
    }
}

/// Abstract broadcaster. The concrete sink owns its own client bookkeeping
/// and back-pressure policy; the engine only ever calls `emit`.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: CrawlEvent);
}

/// `Vec`-backed sink for tests and single-process embedding.
#[derive(Default)]
pub struct InMemorySink {
    events: tokio::sync::Mutex<Vec<CrawlEvent>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<CrawlEvent> {
        self.events.lock().await.clone()
    }

    pub async fn last(&self) -> Option<CrawlEvent> {
        self.events.lock().await.last().cloned()
    }
}

#[async_trait]
impl EventSink for InMemorySink {
    async fn emit(&self, event: CrawlEvent) {
        if !event.status.is_liveness() {
            tracing::debug!(status = ?event.status, url = ?event.url, "crawl event");
        }
        self.events.lock().await.push(event);
    }
}

/// Broadcast-channel backed sink for a real multi-consumer process. A
/// lagging receiver drops its oldest buffered events; we log that once per
/// emit rather than once per dropped event, since `broadcast::Sender::send`
/// does not report lag to the sender.
pub struct BroadcastSink {
    sender: broadcast::Sender<CrawlEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    async fn emit(&self, event: CrawlEvent) {
        if !event.status.is_liveness() {
            tracing::debug!(status = ?event.status, url = ?event.url, "crawl event");
        }
        // No active subscribers is not an error: events are fire-and-forget.
        if self.sender.send(event).is_err() {
            warn!("no subscribers currently receiving crawl events");
        }
    }
}

/// A sink that fans the same event out to several inner sinks, e.g. one
/// broadcast sink for clients plus one in-memory sink for assertions in
/// integration tests.
pub struct FanOutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl EventSink for FanOutSink {
    async fn emit(&self, event: CrawlEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// Helper for building the `stats` payload attached to `progress`/terminal
/// events without each caller hand-rolling a `HashMap`.
pub fn stats_payload(pairs: impl IntoIterator<Item = (&'static str, u64)>) -> serde_json::Value {
    let map: HashMap<&'static str, u64> = pairs.into_iter().collect();
    serde_json::to_value(map).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_sink_records_events_in_order() {
        let sink = InMemorySink::new();
        sink.emit(CrawlEvent::new(EventStatus::Started)).await;
        sink.emit(CrawlEvent::new(EventStatus::Crawling).with_url("http://h/a"))
            .await;
        sink.emit(CrawlEvent::new(EventStatus::Completed)).await;

        let events = sink.events().await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].url.as_deref(), Some("http://h/a"));
        assert_eq!(events[2].status, EventStatus::Completed);
    }

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscriber() {
        let sink = BroadcastSink::new(16);
        let mut rx = sink.subscribe();
        sink.emit(CrawlEvent::new(EventStatus::Ping)).await;

        let received = rx.recv().await.expect("event delivered");
        assert_eq!(received.status, EventStatus::Ping);
    }

    #[tokio::test]
    async fn fan_out_sink_delivers_to_all_inner_sinks() {
        let a = InMemorySink::new();
        let b = InMemorySink::new();
        // FanOutSink needs owned boxes; wrap references via a small adapter.
        struct ArcAdapter(std::sync::Arc<InMemorySink>);
        #[async_trait]
        impl EventSink for ArcAdapter {
            async fn emit(&self, event: CrawlEvent) {
                self.0.emit(event).await;
            }
        }
        let a = std::sync::Arc::new(a);
        let b = std::sync::Arc::new(b);
        let fan_out = FanOutSink::new(vec![
            Box::new(ArcAdapter(a.clone())),
            Box::new(ArcAdapter(b.clone())),
        ]);

        fan_out.emit(CrawlEvent::new(EventStatus::Completed)).await;

        assert_eq!(a.events().await.len(), 1);
        assert_eq!(b.events().await.len(), 1);
    }
}
