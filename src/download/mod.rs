//! Download lifecycle tracking.
//!
//! [`DownloadCoordinator`] turns "download this track" requests into
//! [`TransferEngine`] calls and folds the engine's event stream back into a
//! map of [`DownloadTask`]s keyed by `provider:externalId`. It also keeps a
//! [`CompletionRegistry`] that survives task map resets and can be persisted.
//!
//! The coordinator subscribes to the engine exactly once, when it is created,
//! and unsubscribes when [`DownloadCoordinator::shutdown`] is called or the
//! last clone is dropped.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ensemble::download::{DownloadCoordinator, DownloadStatus, TransferEngine};
//! use ensemble::TrackDescriptor;
//! use std::sync::Arc;
//!
//! # async fn example(engine: Arc<dyn TransferEngine>) -> ensemble::Result<()> {
//! let downloads = DownloadCoordinator::new(engine);
//!
//! let track = TrackDescriptor::titled("Come Together").with_path("tidal:5551234");
//! let key = downloads.request_download(&track).await?;
//!
//! let mut tasks = downloads.subscribe();
//! tasks
//!     .wait_for(|t| t.get(&key).is_some_and(|t| t.status == DownloadStatus::Complete))
//!     .await
//!     .ok();
//! assert!(downloads.is_complete("tidal:5551234"));
//! # Ok(())
//! # }
//! ```

mod engine;
mod registry;
mod task;

pub use engine::{
    TransferEngine, TransferEvent, TransferEventBus, TransferMetadata, TransferPhase,
    TransferSubscription,
};
pub use registry::CompletionRegistry;
pub use task::{DownloadStatus, DownloadTask, TaskMap};

use derive_builder::Builder;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identity::{QualifiedId, TaskKey};
use crate::types::TrackDescriptor;
use task::{Admission, Applied, Ledger};

/// Coordinator settings.
///
/// ```rust
/// use ensemble::download::CoordinatorConfigBuilder;
///
/// let config = CoordinatorConfigBuilder::default()
///     .legacy_provider("qobuz")
///     .build()
///     .unwrap();
/// assert_eq!(config.completion_threshold, 0.99);
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Provider that bare numeric ids are attributed to
    pub legacy_provider: String,

    /// Progress at or above this fraction counts as complete
    pub completion_threshold: f32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            legacy_provider: "tidal".to_string(),
            completion_threshold: 0.99,
        }
    }
}

struct Shared {
    engine: Arc<dyn TransferEngine>,
    config: CoordinatorConfig,
    ledger: Mutex<Ledger>,
    tasks_tx: watch::Sender<TaskMap>,
}

impl Shared {
    /// Runs `f` against the ledger and republishes the task map if it changed.
    fn update<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        let mut ledger = self.ledger.lock();
        let result = f(&mut ledger);
        self.tasks_tx.send_if_modified(|current| {
            if *current != *ledger.tasks() {
                *current = ledger.tasks().clone();
                true
            } else {
                false
            }
        });
        result
    }

    fn resolve(&self, raw: &str) -> Option<TaskKey> {
        QualifiedId::resolve(raw, &self.config.legacy_provider)
    }

    fn handle_event(&self, event: TransferEvent) {
        let Some(key) = event.key().and_then(|raw| self.resolve(raw)) else {
            match &event {
                TransferEvent::Error { message, .. } => {
                    warn!(%message, "transfer error without a usable key")
                }
                other => debug!(key = ?other.key(), "ignoring event with unresolvable key"),
            }
            return;
        };

        let applied = match event {
            TransferEvent::Progress {
                fraction, phase, ..
            } => self.update(|l| l.progress(&key, fraction, phase)),
            TransferEvent::Complete { title, artist, .. } => {
                let applied =
                    self.update(|l| l.complete(&key, title.as_deref(), artist.as_deref()));
                if applied == Applied::Changed {
                    info!(%key, "download complete");
                }
                applied
            }
            TransferEvent::Error { message, .. } => {
                let error = Error::runtime(key.to_string(), message.as_str());
                warn!(%error, "transfer failed");
                self.update(|l| l.fail(&key, &message))
            }
        };

        if let Applied::Ignored(reason) = applied {
            debug!(%key, reason, "transfer event ignored");
        }
    }
}

struct Listener(JoinHandle<()>);

impl Drop for Listener {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Tracks download tasks for one transfer engine.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct DownloadCoordinator {
    shared: Arc<Shared>,
    listener: Arc<Listener>,
}

impl DownloadCoordinator {
    /// Starts a coordinator with the default configuration and an empty
    /// registry. Must be called inside a tokio runtime.
    pub fn new(engine: Arc<dyn TransferEngine>) -> Self {
        Self::start(engine, CoordinatorConfig::default(), CompletionRegistry::new())
    }

    /// Starts a coordinator seeded with previously recorded completions.
    pub fn with_registry(engine: Arc<dyn TransferEngine>, registry: CompletionRegistry) -> Self {
        Self::start(engine, CoordinatorConfig::default(), registry)
    }

    pub fn start(
        engine: Arc<dyn TransferEngine>,
        config: CoordinatorConfig,
        registry: CompletionRegistry,
    ) -> Self {
        let mut subscription = engine.subscribe();
        let (tasks_tx, _) = watch::channel(TaskMap::new());

        let shared = Arc::new(Shared {
            ledger: Mutex::new(Ledger::new(registry, config.completion_threshold)),
            engine,
            config,
            tasks_tx,
        });

        let events = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                events.handle_event(event);
            }
            debug!("transfer event stream closed");
        });

        Self {
            shared,
            listener: Arc::new(Listener(handle)),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Requests a download and returns its task key.
    ///
    /// Requesting a key that is already pending, downloading or complete
    /// changes nothing. A key in the error state is retried. A start failure
    /// is recorded on the task rather than returned.
    ///
    /// # Errors
    ///
    /// [`Error::MissingIdentity`] when no key can be derived from `track`.
    pub async fn request_download(&self, track: &TrackDescriptor) -> Result<TaskKey> {
        let key = track.task_key(&self.shared.config.legacy_provider)?;

        match self.shared.update(|l| l.request(&key, track)) {
            Admission::Start => {}
            Admission::InFlight => {
                debug!(%key, "download already in flight");
                return Ok(key);
            }
            Admission::AlreadyComplete => {
                debug!(%key, "download already complete");
                return Ok(key);
            }
        }

        info!(%key, title = %track.title, "starting transfer");
        let metadata = TransferMetadata::from(track);
        match self.shared.engine.start_transfer(&key, &metadata).await {
            Ok(()) => {
                self.shared.update(|l| l.start_succeeded(&key));
            }
            Err(e) => {
                let error = Error::start_failed(key.to_string(), e.to_string());
                warn!(%error, "transfer did not start");
                let message = e.to_string();
                self.shared.update(|l| l.start_failed(&key, &message));
            }
        }

        Ok(key)
    }

    /// Deletes the downloaded artifact and forgets the task and its
    /// completion record. Returns `false` when nothing was tracked.
    ///
    /// # Errors
    ///
    /// Whatever the engine reports when deleting the artifact; local state is
    /// left untouched in that case.
    pub async fn delete_download(&self, provider_id: &str, external_id: &str) -> Result<bool> {
        let key = QualifiedId::new(provider_id, external_id);
        self.shared.engine.delete_artifact(&key).await?;

        let removed = self.shared.update(|l| l.delete(&key));
        info!(%key, removed, "download deleted");
        Ok(removed)
    }

    /// Whether `key` has completed and not been deleted since.
    ///
    /// Accepts the qualified form or a bare legacy id.
    pub fn is_complete(&self, key: &str) -> bool {
        self.shared
            .resolve(key)
            .is_some_and(|key| self.shared.ledger.lock().registry().contains(&key))
    }

    /// Snapshot of the current task map.
    pub fn tasks(&self) -> TaskMap {
        self.shared.ledger.lock().tasks().clone()
    }

    pub fn task(&self, key: &TaskKey) -> Option<DownloadTask> {
        self.shared.ledger.lock().tasks().get(key).cloned()
    }

    /// A receiver notified whenever the task map changes.
    pub fn subscribe(&self) -> watch::Receiver<TaskMap> {
        self.shared.tasks_tx.subscribe()
    }

    /// Snapshot of the completion registry.
    pub fn registry(&self) -> CompletionRegistry {
        self.shared.ledger.lock().registry().clone()
    }

    /// Persists the completion registry to `path`.
    pub async fn save_registry(&self, path: &Path) -> Result<()> {
        let registry = self.registry();
        registry.save(path).await
    }

    /// Clears every task. Completion records are kept.
    pub fn reset_tasks(&self) {
        self.shared.update(Ledger::reset_tasks);
        debug!("task map reset");
    }

    /// Stops consuming transfer events. Task state stays readable.
    pub fn shutdown(&self) {
        self.listener.0.abort();
    }

    /// Whether the event consumer is still running.
    pub fn is_listening(&self) -> bool {
        !self.listener.0.is_finished()
    }
}
