//! Download tasks and the transitions between their states.
//!
//! ```text
//!   request ──▶ Pending ──start ok──▶ Downloading ──progress≥threshold──▶ Complete
//!                  │                      │                                ▲
//!                  └──start failed──┐     └──error──┐                      │
//!                                   ▼               ▼                      │
//!                                 Error ◀───────────┘ ── complete event ───┘
//!                                   │
//!                                   └── request (retry) ──▶ Pending
//! ```
//!
//! `Complete` is terminal for the task: later progress or error events for
//! the same key are ignored. All transitions go through [`Ledger`], which
//! also owns the [`CompletionRegistry`] so the two are always updated under
//! the same lock.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::engine::TransferPhase;
use super::registry::CompletionRegistry;
use crate::identity::TaskKey;
use crate::types::TrackDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Complete,
    Error,
}

impl DownloadStatus {
    /// Pending or downloading.
    pub fn is_active(self) -> bool {
        matches!(self, DownloadStatus::Pending | DownloadStatus::Downloading)
    }
}

/// One tracked download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub key: TaskKey,
    pub title: String,
    pub artist: Option<String>,
    /// Fraction in `[0, 1]`
    pub progress: f32,
    pub status: DownloadStatus,
    /// Last error message, only set while `status` is `Error`
    pub error: Option<String>,
}

impl DownloadTask {
    fn pending(key: TaskKey, track: &TrackDescriptor) -> Self {
        Self {
            key,
            title: track.title.clone(),
            artist: track.artist.clone(),
            progress: 0.0,
            status: DownloadStatus::Pending,
            error: None,
        }
    }

    fn complete(&mut self) {
        self.status = DownloadStatus::Complete;
        self.progress = 1.0;
        self.error = None;
    }
}

/// Tasks keyed by their canonical key.
pub type TaskMap = BTreeMap<TaskKey, DownloadTask>;

/// What a download request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// A fresh pending task was created; the transfer must be started
    Start,
    /// A task for this key is already pending or downloading
    InFlight,
    /// The key has already completed
    AlreadyComplete,
}

/// Result of applying one transfer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    Changed,
    Ignored(&'static str),
}

pub(crate) struct Ledger {
    tasks: TaskMap,
    registry: CompletionRegistry,
    threshold: f32,
}

impl Ledger {
    pub fn new(registry: CompletionRegistry, threshold: f32) -> Self {
        Self {
            tasks: TaskMap::new(),
            registry,
            threshold,
        }
    }

    pub fn tasks(&self) -> &TaskMap {
        &self.tasks
    }

    pub fn registry(&self) -> &CompletionRegistry {
        &self.registry
    }

    pub fn request(&mut self, key: &TaskKey, track: &TrackDescriptor) -> Admission {
        match self.tasks.get(key).map(|t| t.status) {
            Some(status) if status.is_active() => return Admission::InFlight,
            Some(DownloadStatus::Complete) => return Admission::AlreadyComplete,
            Some(_) => {}
            None if self.registry.contains(key) => {
                let mut task = DownloadTask::pending(key.clone(), track);
                task.complete();
                self.tasks.insert(key.clone(), task);
                return Admission::AlreadyComplete;
            }
            None => {}
        }

        self.tasks
            .insert(key.clone(), DownloadTask::pending(key.clone(), track));
        Admission::Start
    }

    /// The engine accepted the transfer.
    pub fn start_succeeded(&mut self, key: &TaskKey) -> Applied {
        match self.tasks.get_mut(key) {
            Some(task) if task.status == DownloadStatus::Pending => {
                task.status = DownloadStatus::Downloading;
                Applied::Changed
            }
            Some(_) => Applied::Ignored("task already moved past pending"),
            None => Applied::Ignored("task no longer tracked"),
        }
    }

    /// The engine refused or failed to start the transfer.
    pub fn start_failed(&mut self, key: &TaskKey, message: &str) -> Applied {
        match self.tasks.get_mut(key) {
            Some(task) if task.status.is_active() => {
                task.status = DownloadStatus::Error;
                task.error = Some(message.to_string());
                Applied::Changed
            }
            Some(_) => Applied::Ignored("task already settled"),
            None => Applied::Ignored("task no longer tracked"),
        }
    }

    pub fn progress(
        &mut self,
        key: &TaskKey,
        fraction: f32,
        phase: Option<TransferPhase>,
    ) -> Applied {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        if fraction >= self.threshold || phase == Some(TransferPhase::Complete) {
            return self.complete(key, None, None);
        }

        let Some(task) = self.tasks.get_mut(key) else {
            return Applied::Ignored("progress for unknown task");
        };
        match task.status {
            DownloadStatus::Complete => Applied::Ignored("task already complete"),
            DownloadStatus::Error => Applied::Ignored("task already failed"),
            DownloadStatus::Pending | DownloadStatus::Downloading => {
                task.status = DownloadStatus::Downloading;
                task.progress = fraction;
                Applied::Changed
            }
        }
    }

    /// Marks `key` complete. The registry is updated even when no task is
    /// tracked for the key.
    pub fn complete(
        &mut self,
        key: &TaskKey,
        title: Option<&str>,
        artist: Option<&str>,
    ) -> Applied {
        let recorded = self.registry.insert(key.clone());

        match self.tasks.get_mut(key) {
            Some(task) if task.status == DownloadStatus::Complete => {
                if recorded {
                    Applied::Changed
                } else {
                    Applied::Ignored("task already complete")
                }
            }
            Some(task) => {
                task.complete();
                if task.title.is_empty() {
                    if let Some(title) = title {
                        task.title = title.to_string();
                    }
                }
                if task.artist.is_none() {
                    task.artist = artist.map(str::to_string);
                }
                Applied::Changed
            }
            None if recorded => Applied::Changed,
            None => Applied::Ignored("completion already recorded"),
        }
    }

    pub fn fail(&mut self, key: &TaskKey, message: &str) -> Applied {
        let Some(task) = self.tasks.get_mut(key) else {
            return Applied::Ignored("error for unknown task");
        };
        match task.status {
            DownloadStatus::Complete => Applied::Ignored("task already complete"),
            _ => {
                task.status = DownloadStatus::Error;
                task.error = Some(message.to_string());
                Applied::Changed
            }
        }
    }

    /// Drops the task and its completion record.
    pub fn delete(&mut self, key: &TaskKey) -> bool {
        let had_task = self.tasks.remove(key).is_some();
        let had_record = self.registry.remove(key);
        had_task || had_record
    }

    /// Clears the live task map. The registry is untouched.
    pub fn reset_tasks(&mut self) {
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> TaskKey {
        TaskKey::new("tidal", "5551234")
    }

    fn track() -> TrackDescriptor {
        TrackDescriptor::titled("Come Together").with_provider("tidal", "5551234")
    }

    fn downloading() -> Ledger {
        let mut ledger = Ledger::new(CompletionRegistry::new(), 0.99);
        assert_eq!(ledger.request(&key(), &track()), Admission::Start);
        ledger.start_succeeded(&key());
        ledger
    }

    fn status(ledger: &Ledger) -> DownloadStatus {
        ledger.tasks()[&key()].status
    }

    #[test]
    fn request_creates_pending_task() {
        let mut ledger = Ledger::new(CompletionRegistry::new(), 0.99);
        ledger.request(&key(), &track());
        let task = &ledger.tasks()[&key()];
        assert_eq!(task.status, DownloadStatus::Pending);
        assert_eq!(task.progress, 0.0);
        assert_eq!(task.title, "Come Together");
    }

    #[test]
    fn duplicate_request_is_not_restarted() {
        let mut ledger = downloading();
        assert_eq!(ledger.request(&key(), &track()), Admission::InFlight);
        assert_eq!(status(&ledger), DownloadStatus::Downloading);
    }

    #[test]
    fn progress_at_threshold_completes() {
        let mut ledger = downloading();
        ledger.progress(&key(), 0.5, None);
        assert_eq!(ledger.tasks()[&key()].progress, 0.5);
        assert!(!ledger.registry().contains(&key()));

        ledger.progress(&key(), 0.995, None);
        assert_eq!(status(&ledger), DownloadStatus::Complete);
        assert_eq!(ledger.tasks()[&key()].progress, 1.0);
        assert!(ledger.registry().contains(&key()));
    }

    #[test]
    fn complete_phase_completes_below_threshold() {
        let mut ledger = downloading();
        ledger.progress(&key(), 0.4, Some(TransferPhase::Complete));
        assert_eq!(status(&ledger), DownloadStatus::Complete);
    }

    #[test]
    fn complete_is_terminal() {
        let mut ledger = downloading();
        ledger.complete(&key(), None, None);

        assert_eq!(
            ledger.progress(&key(), 0.3, None),
            Applied::Ignored("task already complete")
        );
        assert_eq!(
            ledger.fail(&key(), "late failure"),
            Applied::Ignored("task already complete")
        );
        let task = &ledger.tasks()[&key()];
        assert_eq!(task.status, DownloadStatus::Complete);
        assert_eq!(task.progress, 1.0);
        assert!(task.error.is_none());
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        let mut ledger = downloading();
        ledger.progress(&key(), -3.0, None);
        assert_eq!(ledger.tasks()[&key()].progress, 0.0);
        ledger.progress(&key(), f32::NAN, None);
        assert_eq!(ledger.tasks()[&key()].progress, 0.0);
        ledger.progress(&key(), 7.0, None);
        assert_eq!(status(&ledger), DownloadStatus::Complete);
    }

    #[test]
    fn error_then_retry() {
        let mut ledger = downloading();
        ledger.fail(&key(), "network down");
        assert_eq!(status(&ledger), DownloadStatus::Error);
        assert_eq!(
            ledger.progress(&key(), 0.4, None),
            Applied::Ignored("task already failed")
        );

        assert_eq!(ledger.request(&key(), &track()), Admission::Start);
        let task = &ledger.tasks()[&key()];
        assert_eq!(task.status, DownloadStatus::Pending);
        assert!(task.error.is_none());
    }

    #[test]
    fn completion_after_error_is_accepted() {
        let mut ledger = downloading();
        ledger.fail(&key(), "flaky");
        ledger.complete(&key(), None, None);
        assert_eq!(status(&ledger), DownloadStatus::Complete);
    }

    #[test]
    fn start_failure_marks_error() {
        let mut ledger = Ledger::new(CompletionRegistry::new(), 0.99);
        ledger.request(&key(), &track());
        ledger.start_failed(&key(), "engine refused");
        let task = &ledger.tasks()[&key()];
        assert_eq!(task.status, DownloadStatus::Error);
        assert_eq!(task.error.as_deref(), Some("engine refused"));
    }

    #[test]
    fn late_start_does_not_regress_completion() {
        let mut ledger = Ledger::new(CompletionRegistry::new(), 0.99);
        ledger.request(&key(), &track());
        ledger.complete(&key(), None, None);
        assert_eq!(
            ledger.start_succeeded(&key()),
            Applied::Ignored("task already moved past pending")
        );
        ledger.start_failed(&key(), "too late");
        assert_eq!(status(&ledger), DownloadStatus::Complete);
    }

    #[test]
    fn reset_keeps_registry() {
        let mut ledger = downloading();
        ledger.complete(&key(), None, None);
        ledger.reset_tasks();

        assert!(ledger.tasks().is_empty());
        assert!(ledger.registry().contains(&key()));
        assert_eq!(ledger.request(&key(), &track()), Admission::AlreadyComplete);
        assert_eq!(status(&ledger), DownloadStatus::Complete);
    }

    #[test]
    fn unknown_completion_updates_registry_only() {
        let mut ledger = Ledger::new(CompletionRegistry::new(), 0.99);
        assert_eq!(ledger.complete(&key(), None, None), Applied::Changed);
        assert!(ledger.tasks().is_empty());
        assert!(ledger.registry().contains(&key()));
    }

    #[test]
    fn delete_clears_both() {
        let mut ledger = downloading();
        ledger.complete(&key(), None, None);
        assert!(ledger.delete(&key()));
        assert!(ledger.tasks().is_empty());
        assert!(!ledger.registry().contains(&key()));
        assert!(!ledger.delete(&key()));
    }
}
