//! Directory registration and recursive tree walking.
//!
//! A [`Registrar`] borrows a [`WatchService`] and registers directories
//! against it one at a time ([`Registrar::register`]) or as whole trees
//! ([`Registrar::register_recursive`]). Whether vanished paths are skipped and
//! whether a handle table is kept is decided by a [`RegistrationPolicy`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::error::WatchError;
use super::service::{WatchHandle, WatchRequest, WatchService};
use super::table::{RegistrationTable, TableUpdate};

/// Behavior switches for a registration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPolicy {
    /// Skip directories that disappear during the pass instead of failing.
    #[serde(default = "default_true")]
    pub ignore_vanished: bool,

    /// Keep a handle -> path table of everything registered.
    #[serde(default = "default_true")]
    pub track_table: bool,

    /// Descend into symlinked directories.
    #[serde(default)]
    pub follow_links: bool,
}

fn default_true() -> bool {
    true
}

impl RegistrationPolicy {
    /// Skip vanished paths and track the table.
    pub fn lenient() -> Self {
        Self {
            ignore_vanished: true,
            track_table: true,
            follow_links: false,
        }
    }

    /// Fail on vanished paths and track the table.
    pub fn strict() -> Self {
        Self {
            ignore_vanished: false,
            ..Self::lenient()
        }
    }
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self::lenient()
    }
}

/// A directory that was registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub handle: WatchHandle,
    pub path: PathBuf,
    /// Table change, when a table is tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<TableUpdate>,
}

/// A path that vanished and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPath {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered(Registration),
    Skipped(SkippedPath),
}

/// Result of a recursive registration pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationSummary {
    pub roots: Vec<PathBuf>,
    pub registered: Vec<Registration>,
    pub skipped: Vec<SkippedPath>,
}

impl RegistrationSummary {
    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// True if nothing was skipped.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    fn push(&mut self, outcome: RegisterOutcome) {
        match outcome {
            RegisterOutcome::Registered(registration) => self.registered.push(registration),
            RegisterOutcome::Skipped(skipped) => self.skipped.push(skipped),
        }
    }
}

/// Registers directories with a watch service.
///
/// The table, when tracked, is owned by the registrar for the duration of the
/// pass and handed back through [`Registrar::into_table`]. On error the table
/// holds everything registered before the failure.
pub struct Registrar<'s, S: WatchService + ?Sized> {
    service: &'s mut S,
    policy: RegistrationPolicy,
    table: Option<RegistrationTable>,
}

impl<'s, S: WatchService + ?Sized> Registrar<'s, S> {
    pub fn new(service: &'s mut S, policy: RegistrationPolicy) -> Self {
        let table = policy.track_table.then(RegistrationTable::new);
        Self {
            service,
            policy,
            table,
        }
    }

    /// Continue from an existing table. Enables table tracking.
    pub fn with_table(mut self, table: RegistrationTable) -> Self {
        self.policy.track_table = true;
        self.table = Some(table);
        self
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    pub fn table(&self) -> Option<&RegistrationTable> {
        self.table.as_ref()
    }

    pub fn into_table(self) -> Option<RegistrationTable> {
        self.table
    }

    /// Register a single directory for create, modify and delete events.
    pub fn register(&mut self, dir: &Path) -> Result<RegisterOutcome, WatchError> {
        match self
            .service
            .register_directory(dir, &WatchRequest::standard())
        {
            Ok(handle) => {
                let update = self.table.as_mut().map(|table| table.record(handle, dir));
                Ok(RegisterOutcome::Registered(Registration {
                    handle,
                    path: dir.to_path_buf(),
                    update,
                }))
            }
            Err(e) if e.is_vanished() && self.policy.ignore_vanished => {
                tracing::warn!(
                    "[watcher] failed to register watcher for path '{}': {e}",
                    dir.display()
                );
                Ok(RegisterOutcome::Skipped(SkippedPath {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }

    /// Register every directory under each starting path, parents first.
    ///
    /// Regular files are not registered; the platform reports their events on
    /// the containing directory. A failure other than a skipped vanished path
    /// aborts the whole pass, including later starting paths.
    pub fn register_recursive<I, P>(
        &mut self,
        starting_paths: I,
    ) -> Result<RegistrationSummary, WatchError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut summary = RegistrationSummary::default();

        for start in starting_paths {
            let start = start.as_ref();
            summary.roots.push(start.to_path_buf());
            self.walk(start, &mut summary)?;
        }

        crate::log_event!(
            "watcher",
            "registered",
            "{} directories under {} roots ({} skipped)",
            summary.registered_count(),
            summary.roots.len(),
            summary.skipped_count()
        );

        Ok(summary)
    }

    fn walk(&mut self, start: &Path, summary: &mut RegistrationSummary) -> Result<(), WatchError> {
        // A directory can fail twice: once when registered, once when listed
        let mut vanished: HashSet<PathBuf> = HashSet::new();

        let walker = WalkDir::new(start)
            .follow_links(self.policy.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if self.policy.follow_links && is_dangling_link(&err) {
                        if let Some(path) = err.path() {
                            crate::debug_event!("watcher", "dangling link", "{}", path.display());
                        }
                        continue;
                    }
                    let err = WatchError::from_walk(err);
                    if !(err.is_vanished() && self.policy.ignore_vanished) {
                        return Err(err);
                    }
                    if let WatchError::PathVanished { path } = &err {
                        crate::debug_event!("watcher", "vanished during walk", "{}", path.display());
                        if vanished.insert(path.clone()) {
                            summary.skipped.push(SkippedPath {
                                path: path.clone(),
                                reason: err.to_string(),
                            });
                        }
                    }
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let outcome = self.register(entry.path())?;
            if let RegisterOutcome::Skipped(skipped) = &outcome {
                vanished.insert(skipped.path.clone());
            }
            summary.push(outcome);
        }

        Ok(())
    }
}

/// A followed symlink whose target does not exist. The link itself is still
/// there, so nothing vanished; it is simply not a directory.
fn is_dangling_link(err: &walkdir::Error) -> bool {
    let not_found = err
        .io_error()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound);

    not_found
        && err.depth() > 0
        && err
            .path()
            .and_then(|path| std::fs::symlink_metadata(path).ok())
            .is_some_and(|metadata| metadata.file_type().is_symlink())
}
