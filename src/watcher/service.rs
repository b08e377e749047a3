//! Watch-service capability and its `notify` implementation.
//!
//! The registrar only needs to register directories and, eventually, close
//! the session. Everything platform-specific lives behind [`WatchService`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use crossbeam_channel::{Receiver, unbounded};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::error::WatchError;

/// Token identifying one directory's registration within a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WatchHandle(u64);

impl WatchHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Entry-level event kinds a registration asks to be notified about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventKinds: u8 {
        const CREATE = 1 << 0;
        const MODIFY = 1 << 1;
        const DELETE = 1 << 2;
    }
}

impl EventKinds {
    /// Map a `notify` event kind. Access and unclassified events map to empty.
    pub fn from_event_kind(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => EventKinds::CREATE,
            EventKind::Modify(_) => EventKinds::MODIFY,
            EventKind::Remove(_) => EventKinds::DELETE,
            _ => EventKinds::empty(),
        }
    }
}

/// Notification latency. Higher sensitivity means shorter polling intervals
/// on backends that poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

impl Sensitivity {
    pub const HIGHEST: Sensitivity = Sensitivity::High;

    pub fn poll_interval(self) -> Duration {
        match self {
            Sensitivity::Low => Duration::from_secs(30),
            Sensitivity::Medium => Duration::from_secs(10),
            Sensitivity::High => Duration::from_secs(2),
        }
    }
}

/// What a single directory registration asks of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchRequest {
    pub kinds: EventKinds,
    pub sensitivity: Sensitivity,
}

impl WatchRequest {
    /// Create, modify and delete at the highest sensitivity.
    pub fn standard() -> Self {
        Self {
            kinds: EventKinds::CREATE | EventKinds::MODIFY | EventKinds::DELETE,
            sensitivity: Sensitivity::HIGHEST,
        }
    }
}

impl Default for WatchRequest {
    fn default() -> Self {
        Self::standard()
    }
}

/// Platform file-change notification session.
///
/// Implementations must return the same handle when the same directory is
/// registered again. They may also return an existing handle for a different
/// path when the platform identifies the directory by something other than
/// its path (e.g. a renamed directory).
pub trait WatchService {
    /// Register a single directory (non-recursively).
    fn register_directory(
        &mut self,
        dir: &Path,
        request: &WatchRequest,
    ) -> Result<WatchHandle, WatchError>;

    /// End the session. Registrations after this fail with `ServiceClosed`.
    fn close(&mut self) -> Result<(), WatchError>;
}

/// How the platform identifies a directory. Inotify hands out one watch
/// descriptor per inode, so a renamed directory keeps its handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DirIdentity {
    #[cfg(unix)]
    Inode { dev: u64, ino: u64 },
    #[cfg_attr(unix, allow(dead_code))]
    Path(PathBuf),
}

impl DirIdentity {
    fn of(dir: &Path) -> Result<Self, WatchError> {
        let metadata = std::fs::metadata(dir).map_err(|e| lookup_error(dir, e))?;

        if !metadata.is_dir() {
            return Err(WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Ok(DirIdentity::Inode {
                dev: metadata.dev(),
                ino: metadata.ino(),
            })
        }

        #[cfg(not(unix))]
        {
            let canonical = dir.canonicalize().map_err(|e| lookup_error(dir, e))?;
            Ok(DirIdentity::Path(canonical))
        }
    }
}

fn lookup_error(dir: &Path, err: std::io::Error) -> WatchError {
    if err.kind() == std::io::ErrorKind::NotFound {
        WatchError::PathVanished {
            path: dir.to_path_buf(),
        }
    } else {
        WatchError::PathWatchFailed {
            path: dir.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Requested kinds per watched directory, shared with the event callback.
type KindFilter = Arc<RwLock<HashMap<PathBuf, EventKinds>>>;

/// Watched directories the backend reported as removed, waiting to be pruned.
type RemovedDirs = Arc<Mutex<Vec<PathBuf>>>;

/// Remember removals of watched directories so their identities are released.
/// Renames arrive as modify events and keep their entries.
fn record_removals(filter: &KindFilter, removed: &RemovedDirs, event: &Event) {
    if !event.kind.is_remove() {
        return;
    }

    let filter = filter.read();
    let mut removed = removed.lock();
    for path in &event.paths {
        if filter.contains_key(path) {
            removed.push(path.clone());
        }
    }
}

/// Forward an event only if the directory it happened in asked for its kind.
fn accepts(filter: &KindFilter, event: &Event) -> bool {
    let kind = EventKinds::from_event_kind(&event.kind);
    if kind.is_empty() {
        return false;
    }

    let filter = filter.read();
    event.paths.iter().any(|path| {
        let own = filter.get(path.as_path());
        let parent = path.parent().and_then(|p| filter.get(p));
        own.into_iter().chain(parent).any(|kinds| kinds.intersects(kind))
    })
}

/// [`WatchService`] backed by a `notify` watcher.
///
/// Each directory is watched non-recursively. Matching events are delivered
/// on the receiver returned from the constructor.
pub struct NotifyWatchService<W: Watcher = RecommendedWatcher> {
    watcher: W,
    filter: KindFilter,
    removed: RemovedDirs,
    handles: HashMap<DirIdentity, WatchHandle>,
    watched: HashMap<WatchHandle, PathBuf>,
    next_handle: u64,
    sensitivity: Sensitivity,
    closed: bool,
}

impl NotifyWatchService<RecommendedWatcher> {
    /// Open a session on the platform's recommended backend.
    pub fn new() -> Result<(Self, Receiver<Event>), WatchError> {
        Self::with_backend()
    }
}

impl<W: Watcher> NotifyWatchService<W> {
    /// Open a session on an explicit backend, e.g. `notify::PollWatcher`.
    ///
    /// Polling backends are configured with the interval of
    /// [`Sensitivity::HIGHEST`].
    pub fn with_backend() -> Result<(Self, Receiver<Event>), WatchError> {
        let sensitivity = Sensitivity::HIGHEST;
        let (tx, rx) = unbounded();
        let filter: KindFilter = Arc::default();
        let removed: RemovedDirs = Arc::default();
        let callback_filter = Arc::clone(&filter);
        let callback_removed = Arc::clone(&removed);

        let config = Config::default().with_poll_interval(sensitivity.poll_interval());
        let watcher = W::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    record_removals(&callback_filter, &callback_removed, &event);
                    if accepts(&callback_filter, &event) {
                        let _ = tx.send(event);
                    }
                }
                Err(e) => {
                    tracing::error!("[watcher] file watch error: {e}");
                }
            },
            config,
        )?;

        crate::debug_event!("watcher", "service opened", "{:?}", W::kind());

        Ok((
            Self {
                watcher,
                filter,
                removed,
                handles: HashMap::new(),
                watched: HashMap::new(),
                next_handle: 1,
                sensitivity,
                closed: false,
            },
            rx,
        ))
    }

    pub fn sensitivity(&self) -> Sensitivity {
        self.sensitivity
    }

    /// Number of directories currently registered.
    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drop handles of directories that were removed, so a new directory
    /// reusing the inode gets a fresh handle.
    fn prune_removed(&mut self) {
        let removed: Vec<PathBuf> = std::mem::take(&mut *self.removed.lock());
        if removed.is_empty() {
            return;
        }

        let mut filter = self.filter.write();
        for path in removed {
            let Some(handle) = self
                .watched
                .iter()
                .find(|(_, watched)| **watched == path)
                .map(|(handle, _)| *handle)
            else {
                continue;
            };

            // The kernel already dropped the watch; polling backends still hold it.
            let _ = self.watcher.unwatch(&path);
            self.watched.remove(&handle);
            self.handles.retain(|_, h| *h != handle);
            filter.remove(&path);
            crate::debug_event!("watcher", "released", "{handle} {}", path.display());
        }
    }
}

impl<W: Watcher> WatchService for NotifyWatchService<W> {
    fn register_directory(
        &mut self,
        dir: &Path,
        request: &WatchRequest,
    ) -> Result<WatchHandle, WatchError> {
        if self.closed {
            return Err(WatchError::ServiceClosed);
        }

        self.prune_removed();

        let identity = DirIdentity::of(dir)?;

        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::from_notify(dir, e))?;

        let next_handle = &mut self.next_handle;
        let handle = *self.handles.entry(identity).or_insert_with(|| {
            let handle = WatchHandle::new(*next_handle);
            *next_handle += 1;
            handle
        });

        let mut filter = self.filter.write();
        if let Some(previous) = self.watched.insert(handle, dir.to_path_buf()) {
            if previous != dir {
                filter.remove(&previous);
            }
        }
        filter.insert(dir.to_path_buf(), request.kinds);

        Ok(handle)
    }

    fn close(&mut self) -> Result<(), WatchError> {
        if self.closed {
            return Ok(());
        }

        for path in self.watched.values() {
            if let Err(e) = self.watcher.unwatch(path) {
                crate::debug_event!("watcher", "unwatch failed", "{}: {e}", path.display());
            }
        }

        self.watched.clear();
        self.handles.clear();
        self.filter.write().clear();
        self.removed.lock().clear();
        self.closed = true;

        crate::debug_event!("watcher", "service closed");
        Ok(())
    }
}
