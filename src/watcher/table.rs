//! Lookup table from watch handles to the directories they watch.
//!
//! Entries are created or overwritten during registration. Removing stale
//! entries (for deleted directories) is left to whoever consumes events.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::service::WatchHandle;

/// What happened to the table when a registration was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableUpdate {
    /// First time this handle was seen.
    Inserted,
    /// Handle already mapped to the same path.
    Unchanged,
    /// Handle was reused for a different path (rename or replace).
    Replaced { previous: PathBuf },
}

/// Mapping from `WatchHandle` to the watched directory.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RegistrationTable {
    entries: HashMap<WatchHandle, PathBuf>,
}

impl RegistrationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a registration, overwriting any previous path for the handle.
    pub fn record(&mut self, handle: WatchHandle, path: &Path) -> TableUpdate {
        match self.entries.insert(handle, path.to_path_buf()) {
            None => {
                crate::debug_event!("watcher", "registering watched path", "{}", path.display());
                TableUpdate::Inserted
            }
            Some(previous) if previous == path => TableUpdate::Unchanged,
            Some(previous) => {
                crate::debug_event!(
                    "watcher",
                    "update watched path",
                    "{} -> {}",
                    previous.display(),
                    path.display()
                );
                TableUpdate::Replaced { previous }
            }
        }
    }

    /// Drop the entry for a handle that is no longer active.
    pub fn remove(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        self.entries.remove(&handle)
    }

    pub fn get(&self, handle: WatchHandle) -> Option<&Path> {
        self.entries.get(&handle).map(PathBuf::as_path)
    }

    /// Reverse lookup. Linear in the table size.
    pub fn handle_for(&self, path: &Path) -> Option<WatchHandle> {
        self.entries
            .iter()
            .find(|(_, p)| p.as_path() == path)
            .map(|(handle, _)| *handle)
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.handle_for(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WatchHandle, &Path)> {
        self.entries.iter().map(|(h, p)| (*h, p.as_path()))
    }

    /// All watched paths, sorted.
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.entries.values().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }
}
