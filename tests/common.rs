//! Common test utilities and fakes
//!
//! Shared functionality used across all test modules.
// Common test utilities - all must be public

use async_trait::async_trait;
use ensemble::download::{TransferEngine, TransferEvent, TransferEventBus, TransferMetadata, TransferSubscription};
use ensemble::error::{Error, Result};
use ensemble::prelude::*;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);
#[allow(dead_code)]
pub const DEBOUNCE: Duration = Duration::from_millis(180);
/// Comfortably past the debounce window
#[allow(dead_code)]
pub const SETTLE: Duration = Duration::from_millis(400);

/// Routes `tracing` output through the test harness. Set `RUST_LOG` to see it.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Lets spawned tasks drain their queues.
#[allow(dead_code)]
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Respond,
    Fail,
    Panic,
}

/// Provider answering from canned per-query responses, with optional
/// per-query latency.
#[allow(dead_code)]
pub struct ScriptedProvider {
    id: String,
    behavior: Behavior,
    available: bool,
    latency: Duration,
    slow_queries: HashMap<String, Duration>,
    tracks: HashMap<String, Vec<TrackMatch>>,
    albums: HashMap<String, Vec<AlbumMatch>>,
    artists: HashMap<String, Vec<ArtistMatch>>,
    calls: Arc<Mutex<Vec<(EntityKind, String)>>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            behavior: Behavior::Respond,
            available: true,
            latency: Duration::from_millis(20),
            slow_queries: HashMap::new(),
            tracks: HashMap::new(),
            albums: HashMap::new(),
            artists: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn behaving(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn slow_for(mut self, query: &str, latency: Duration) -> Self {
        self.slow_queries.insert(query.to_string(), latency);
        self
    }

    pub fn tracks(mut self, query: &str, tracks: Vec<TrackMatch>) -> Self {
        self.tracks.insert(query.to_string(), tracks);
        self
    }

    pub fn albums(mut self, query: &str, albums: Vec<AlbumMatch>) -> Self {
        self.albums.insert(query.to_string(), albums);
        self
    }

    pub fn artists(mut self, query: &str, artists: Vec<ArtistMatch>) -> Self {
        self.artists.insert(query.to_string(), artists);
        self
    }

    /// Shared log of every search call, as `(kind, query)`.
    pub fn call_log(&self) -> Arc<Mutex<Vec<(EntityKind, String)>>> {
        Arc::clone(&self.calls)
    }

    async fn answer<T: Clone>(
        &self,
        kind: EntityKind,
        query: &str,
        canned: &HashMap<String, Vec<T>>,
    ) -> Result<Vec<T>> {
        self.calls.lock().push((kind, query.to_string()));

        let latency = self
            .slow_queries
            .get(query)
            .copied()
            .unwrap_or(self.latency);
        tokio::time::sleep(latency).await;

        match self.behavior {
            Behavior::Respond => Ok(canned.get(query).cloned().unwrap_or_default()),
            Behavior::Fail => Err(Error::provider(&self.id, "service unavailable")),
            Behavior::Panic => panic!("{} blew up", self.id),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackMatch>> {
        self.answer(EntityKind::Track, query, &self.tracks).await
    }

    async fn search_albums(&self, query: &str) -> Result<Vec<AlbumMatch>> {
        self.answer(EntityKind::Album, query, &self.albums).await
    }

    async fn search_artists(&self, query: &str) -> Result<Vec<ArtistMatch>> {
        self.answer(EntityKind::Artist, query, &self.artists).await
    }
}

/// Transfer engine that records calls and emits whatever the test tells it to.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeEngine {
    bus: TransferEventBus,
    started: Mutex<Vec<(TaskKey, TransferMetadata)>>,
    deleted: Mutex<Vec<TaskKey>>,
    refused: Mutex<HashSet<String>>,
    fail_deletes: AtomicBool,
}

#[allow(dead_code)]
impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emit(&self, event: TransferEvent) -> usize {
        self.bus.publish(event)
    }

    /// Makes `start_transfer` fail for `key` until [`accept`](Self::accept) is called.
    pub fn refuse(&self, key: &str) {
        self.refused.lock().insert(key.to_string());
    }

    pub fn accept(&self, key: &str) {
        self.refused.lock().remove(key);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().iter().map(|(k, _)| k.to_string()).collect()
    }

    pub fn started_metadata(&self) -> Vec<TransferMetadata> {
        self.started.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().iter().map(|k| k.to_string()).collect()
    }

    pub fn subscribers(&self) -> usize {
        self.bus.subscriber_count()
    }
}

#[async_trait]
impl TransferEngine for FakeEngine {
    async fn start_transfer(&self, key: &TaskKey, metadata: &TransferMetadata) -> Result<()> {
        if self.refused.lock().contains(&key.to_string()) {
            return Err(Error::Other("engine refused the transfer".to_string()));
        }
        self.started.lock().push((key.clone(), metadata.clone()));
        Ok(())
    }

    fn subscribe(&self) -> TransferSubscription {
        self.bus.subscribe()
    }

    async fn delete_artifact(&self, key: &TaskKey) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::not_found(format!("no artifact for {}", key)));
        }
        self.deleted.lock().push(key.clone());
        Ok(())
    }
}

/// A track as the local library reports it, linked to a remote identity.
#[allow(dead_code)]
pub fn local_track(id: &str, title: &str, linked_to: Option<QualifiedId>) -> TrackMatch {
    let track = TrackMatch::new(id, title, "The Beatles").with_album("Abbey Road");
    match linked_to {
        Some(link) => track.with_link(link),
        None => track,
    }
}
