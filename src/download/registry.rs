//! Completion registry.
//!
//! Records which task keys have completed, independently of the live task
//! map. Entries are only ever added by completion and only removed by an
//! explicit deletion, so the registry keeps answering "has this track been
//! downloaded" after the task map is cleared or the process restarts (when
//! persisted with [`CompletionRegistry::save`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;

use crate::error::Result;
use crate::identity::TaskKey;

/// Set of task keys that have completed at least once and not been deleted since.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionRegistry {
    keys: BTreeSet<TaskKey>,
}

impl CompletionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completion. Returns `true` if the key was not yet present.
    pub fn insert(&mut self, key: TaskKey) -> bool {
        self.keys.insert(key)
    }

    /// Forgets a key. Only deletion of the downloaded artifact should call this.
    pub fn remove(&mut self, key: &TaskKey) -> bool {
        self.keys.remove(key)
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskKey> {
        self.keys.iter()
    }

    /// Loads a registry written by [`save`](Self::save).
    ///
    /// A missing file yields an empty registry.
    pub async fn load(path: &Path) -> Result<Self> {
        match fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the registry as a JSON array of keys, creating parent
    /// directories as needed.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json).await?;
        Ok(())
    }
}

impl FromIterator<TaskKey> for CompletionRegistry {
    fn from_iter<I: IntoIterator<Item = TaskKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
