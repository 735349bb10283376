//! Transfer engine contract and event plumbing.
//!
//! The engine performs the actual transfer; this crate only tracks what it
//! reports. Events reach the coordinator through a [`TransferSubscription`]
//! taken once when the coordinator starts and released when it stops.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identity::TaskKey;
use crate::types::TrackDescriptor;

/// Descriptive data handed to the engine alongside the task key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl From<&TrackDescriptor> for TransferMetadata {
    fn from(track: &TrackDescriptor) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
        }
    }
}

/// Phase reported alongside a progress tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPhase {
    Downloading,
    Complete,
}

/// Lifecycle event emitted by a transfer engine.
///
/// Keys are the engine's own strings. The coordinator resolves them to the
/// canonical `provider:externalId` form on a best-effort basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransferEvent {
    Progress {
        key: String,
        fraction: f32,
        #[serde(default)]
        phase: Option<TransferPhase>,
    },
    Complete {
        key: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        artist: Option<String>,
    },
    Error {
        #[serde(default)]
        key: Option<String>,
        message: String,
    },
}

impl TransferEvent {
    pub fn progress(key: impl Into<String>, fraction: f32) -> Self {
        TransferEvent::Progress {
            key: key.into(),
            fraction,
            phase: None,
        }
    }

    pub fn complete(key: impl Into<String>) -> Self {
        TransferEvent::Complete {
            key: key.into(),
            title: None,
            artist: None,
        }
    }

    pub fn error(key: impl Into<String>, message: impl Into<String>) -> Self {
        TransferEvent::Error {
            key: Some(key.into()),
            message: message.into(),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            TransferEvent::Progress { key, .. } | TransferEvent::Complete { key, .. } => Some(key),
            TransferEvent::Error { key, .. } => key.as_deref(),
        }
    }
}

/// Receiving end of an engine's event stream.
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct TransferSubscription {
    rx: mpsc::UnboundedReceiver<TransferEvent>,
}

impl TransferSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<TransferEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the engine side has gone away.
    pub async fn recv(&mut self) -> Option<TransferEvent> {
        self.rx.recv().await
    }
}

/// External subsystem performing transfers.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Starts transferring `key`. Progress is reported through the event
    /// stream, not through this call.
    async fn start_transfer(&self, key: &TaskKey, metadata: &TransferMetadata) -> Result<()>;

    /// Opens a new event subscription.
    fn subscribe(&self) -> TransferSubscription;

    /// Removes the downloaded artifact for `key`.
    async fn delete_artifact(&self, _key: &TaskKey) -> Result<()> {
        Ok(())
    }
}

/// Fan-out event publisher for engine implementations.
///
/// Each [`subscribe`](Self::subscribe) call gets its own unbounded queue, so
/// a slow subscriber never causes events to be dropped. Subscribers that have
/// gone away are pruned on the next publish.
///
/// ```rust
/// use ensemble::download::{TransferEvent, TransferEventBus};
///
/// # async fn example() {
/// let bus = TransferEventBus::new();
/// let mut sub = bus.subscribe();
///
/// bus.publish(TransferEvent::progress("tidal:1", 0.5));
/// assert_eq!(sub.recv().await, Some(TransferEvent::progress("tidal:1", 0.5)));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransferEventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<TransferEvent>>>>,
}

impl TransferEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> TransferSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        TransferSubscription::new(rx)
    }

    /// Delivers `event` to every live subscriber, returning how many got it.
    pub fn publish(&self, event: TransferEvent) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}
