//! Scheduler module for polling greenhouse feeds.

mod poller;

pub use poller::*;

use crate::config::ServerConfig;
use crate::fetch::{FetchError, HttpSource, SensorSource};
use crate::pipeline::{ZoneKind, ZoneSchema};

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Identifies one polled feed: a greenhouse zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FeedKey {
    pub greenhouse: String,
    pub zone: ZoneKind,
}

impl FeedKey {
    pub fn new(greenhouse: impl Into<String>, zone: ZoneKind) -> Self {
        Self {
            greenhouse: greenhouse.into(),
            zone,
        }
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.greenhouse, self.zone)
    }
}

/// The main scheduler that owns one poller per feed.
pub struct Scheduler {
    interval: Duration,
    feeds: RwLock<HashMap<FeedKey, PollHandle>>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            feeds: RwLock::new(HashMap::new()),
        }
    }

    /// Start polling every feed named in the configuration.
    pub async fn start(&self, cfg: &ServerConfig) -> Result<(), FetchError> {
        tracing::info!("Starting scheduler with {} feeds", cfg.feeds.len());

        for key in &cfg.feeds {
            self.add_http_feed(cfg, key.clone()).await?;
        }

        Ok(())
    }

    /// Poll a feed from the configured backend. Returns false if it is already running.
    pub async fn add_http_feed(&self, cfg: &ServerConfig, key: FeedKey) -> Result<bool, FetchError> {
        let schema = cfg.schemas.get(key.zone).clone();
        let source = HttpSource::new(
            &cfg.api_url,
            &schema.endpoint(&key.greenhouse),
            cfg.api_token.clone(),
            cfg.request_timeout,
        )?;
        tracing::debug!("Scheduler: {} -> {}", key, source.url());

        Ok(self.add_feed(key, Arc::new(source), schema).await)
    }

    /// Add a feed to be polled. Returns false if it is already running.
    pub async fn add_feed<S: SensorSource>(&self, key: FeedKey, source: Arc<S>, schema: ZoneSchema) -> bool {
        let mut feeds = self.feeds.write().await;

        if feeds.contains_key(&key) {
            return false;
        }

        tracing::info!("Scheduler: Adding feed {}", key);

        let settings = PollSettings {
            label: key.to_string(),
            interval: self.interval,
            schema,
        };
        feeds.insert(key, PollHandle::spawn(source, settings));
        true
    }

    /// Stop polling a feed.
    pub async fn remove_feed(&self, key: &FeedKey) -> bool {
        let mut feeds = self.feeds.write().await;

        match feeds.remove(key) {
            Some(handle) => {
                handle.stop();
                tracing::info!("Scheduler: Removed feed {}", key);
                true
            }
            None => false,
        }
    }

    pub async fn snapshot(&self, key: &FeedKey) -> Option<FeedSnapshot> {
        self.feeds.read().await.get(key).map(PollHandle::snapshot)
    }

    /// Trigger an immediate fetch. Returns false for unknown feeds.
    pub async fn refresh(&self, key: &FeedKey) -> bool {
        match self.feeds.read().await.get(key) {
            Some(handle) => {
                handle.refresh();
                true
            }
            None => false,
        }
    }

    /// All feeds with their current state, ordered by key.
    pub async fn feeds(&self) -> Vec<(FeedKey, FeedSnapshot)> {
        let feeds = self.feeds.read().await;
        let mut out: Vec<_> = feeds.iter().map(|(k, h)| (k.clone(), h.snapshot())).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Stop every poller.
    pub async fn shutdown(&self) {
        let mut feeds = self.feeds.write().await;
        for (key, handle) in feeds.drain() {
            handle.stop();
            tracing::debug!("Scheduler: Stopped feed {}", key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{ScriptedSource, Step};
    use serde_json::json;

    fn source() -> Arc<ScriptedSource> {
        Arc::new(ScriptedSource::new(vec![Step::ok(vec![
            json!({"timestamp": "2025-01-01T00:00:00Z", "temperature": 20, "humidity": 55}),
        ])]))
    }

    #[test]
    fn test_feed_key_display() {
        assert_eq!(FeedKey::new("3", ZoneKind::Hot).to_string(), "3/hot");
    }

    #[tokio::test]
    async fn test_add_and_remove_feed() {
        let scheduler = Scheduler::new(Duration::from_secs(3600));
        let key = FeedKey::new("1", ZoneKind::Cold);

        assert!(scheduler.add_feed(key.clone(), source(), ZoneSchema::cold()).await);
        assert!(!scheduler.add_feed(key.clone(), source(), ZoneSchema::cold()).await);
        assert_eq!(scheduler.feeds().await.len(), 1);

        let snap = scheduler.snapshot(&key).await.unwrap();
        assert_eq!(snap.metrics, vec!["humidity", "temperature"]);

        assert!(scheduler.remove_feed(&key).await);
        assert!(!scheduler.remove_feed(&key).await);
        assert!(scheduler.snapshot(&key).await.is_none());
        assert!(!scheduler.refresh(&key).await);
    }

    #[tokio::test]
    async fn test_start_from_config() {
        let cfg = ServerConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            feeds: vec![FeedKey::new("1", ZoneKind::Cold), FeedKey::new("2", ZoneKind::Hot)],
            request_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let scheduler = Scheduler::new(Duration::from_secs(3600));
        tokio_test::assert_ok!(scheduler.start(&cfg).await);
        assert_eq!(scheduler.feeds().await.len(), 2);

        let again = scheduler.add_http_feed(&cfg, FeedKey::new("1", ZoneKind::Cold)).await;
        assert!(!again.unwrap());

        let hot = scheduler.snapshot(&FeedKey::new("2", ZoneKind::Hot)).await.unwrap();
        assert_eq!(hot.metrics.len(), 4);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_feeds_sorted_and_shutdown() {
        let scheduler = Scheduler::new(Duration::from_secs(3600));
        scheduler.add_feed(FeedKey::new("2", ZoneKind::Cold), source(), ZoneSchema::cold()).await;
        scheduler.add_feed(FeedKey::new("1", ZoneKind::Hot), source(), ZoneSchema::hot()).await;
        scheduler.add_feed(FeedKey::new("1", ZoneKind::Cold), source(), ZoneSchema::cold()).await;

        let keys: Vec<String> = scheduler.feeds().await.into_iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["1/cold", "1/hot", "2/cold"]);

        scheduler.shutdown().await;
        assert!(scheduler.feeds().await.is_empty());
    }
}
