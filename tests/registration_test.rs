//! Registration scenarios against the notify backend and a scripted service.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use dirwatch::watcher::{
    self, NotifyWatchService, Registrar, RegistrationPolicy, RegistrationTable, WatchError,
    WatchHandle, WatchRequest, WatchService,
};
use tempfile::TempDir;

/// Watch service that replays a script of failures.
#[derive(Default)]
struct ScriptedService {
    calls: Vec<PathBuf>,
    handles: HashMap<PathBuf, WatchHandle>,
    /// Directories removed by a "concurrent process" just before registration.
    removed_concurrently: Vec<PathBuf>,
    /// Directories that hit the descriptor limit.
    exhausted: Vec<PathBuf>,
}

impl WatchService for ScriptedService {
    fn register_directory(
        &mut self,
        dir: &Path,
        _request: &WatchRequest,
    ) -> Result<WatchHandle, WatchError> {
        self.calls.push(dir.to_path_buf());

        if self.removed_concurrently.iter().any(|p| p == dir) {
            fs::remove_dir_all(dir).unwrap();
            return Err(WatchError::PathVanished {
                path: dir.to_path_buf(),
            });
        }
        if self.exhausted.iter().any(|p| p == dir) {
            return Err(WatchError::LimitReached {
                path: dir.to_path_buf(),
            });
        }

        let next = WatchHandle::new(self.handles.len() as u64 + 1);
        Ok(*self.handles.entry(dir.to_path_buf()).or_insert(next))
    }

    fn close(&mut self) -> Result<(), WatchError> {
        Ok(())
    }
}

/// a/{b, c} with c empty and a file in b.
fn tree_a() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("b")).unwrap();
    fs::create_dir(dir.path().join("c")).unwrap();
    fs::write(dir.path().join("b").join("notes.txt"), "notes").unwrap();
    dir
}

#[test]
fn test_three_directories_three_registrations() {
    let tree = tree_a();
    let root = tree.path();
    let (mut service, _events) = NotifyWatchService::new().unwrap();

    let (summary, table) =
        watcher::register_recursive(&mut service, RegistrationPolicy::default(), [root]).unwrap();
    let table = table.unwrap();

    let registered: Vec<PathBuf> = summary.registered.iter().map(|r| r.path.clone()).collect();
    assert_eq!(
        registered,
        vec![root.to_path_buf(), root.join("b"), root.join("c")]
    );
    assert_eq!(table.len(), 3);
    assert_eq!(service.watched_count(), 3);
    assert!(summary.is_complete());
}

#[test]
fn test_repeat_registration_is_idempotent() {
    let tree = tree_a();
    let (mut service, _events) = NotifyWatchService::new().unwrap();

    let (_, table) =
        watcher::register_recursive(&mut service, RegistrationPolicy::default(), [tree.path()])
            .unwrap();
    let mut registrar =
        Registrar::new(&mut service, RegistrationPolicy::default()).with_table(table.unwrap());
    registrar.register_recursive([tree.path()]).unwrap();

    assert_eq!(registrar.table().unwrap().len(), 3);
}

#[test]
fn test_concurrent_removal_lenient() {
    let tree = TempDir::new().unwrap();
    let root = tree.path();
    fs::create_dir(root.join("b")).unwrap();

    let mut service = ScriptedService {
        removed_concurrently: vec![root.join("b")],
        ..ScriptedService::default()
    };
    let service: &mut dyn WatchService = &mut service;

    let (summary, table) =
        watcher::register_recursive(service, RegistrationPolicy::lenient(), [root]).unwrap();
    let table = table.unwrap();

    assert_eq!(table.len(), 1);
    assert!(table.contains_path(root));
    assert_eq!(summary.skipped_count(), 1);
}

#[test]
fn test_concurrent_removal_strict() {
    let tree = TempDir::new().unwrap();
    let root = tree.path();
    fs::create_dir(root.join("b")).unwrap();

    let mut service = ScriptedService {
        removed_concurrently: vec![root.join("b")],
        ..ScriptedService::default()
    };

    let mut registrar = Registrar::new(&mut service, RegistrationPolicy::strict());
    let err = registrar.register_recursive([root]).unwrap_err();

    assert!(err.is_vanished());
    assert!(registrar.table().unwrap().len() <= 1);
}

#[test]
fn test_descriptor_limit_surfaces_under_both_policies() {
    for policy in [RegistrationPolicy::lenient(), RegistrationPolicy::strict()] {
        let tree = tree_a();
        let root = tree.path();
        let mut service = ScriptedService {
            exhausted: vec![root.join("b")],
            ..ScriptedService::default()
        };

        let err = watcher::register_recursive(&mut service, policy, [root]).unwrap_err();

        assert!(matches!(err, WatchError::LimitReached { .. }));
        assert!(!service.calls.contains(&root.join("c")));
    }
}

#[test]
fn test_missing_root_with_notify_backend() {
    let tree = TempDir::new().unwrap();
    let missing = tree.path().join("not-created");
    let (mut service, _events) = NotifyWatchService::new().unwrap();

    let (summary, table) =
        watcher::register_recursive(&mut service, RegistrationPolicy::lenient(), [&missing])
            .unwrap();
    assert_eq!(summary.registered_count(), 0);
    assert_eq!(summary.skipped[0].path, missing);
    assert!(table.unwrap().is_empty());

    let err = watcher::register_recursive(&mut service, RegistrationPolicy::strict(), [&missing])
        .unwrap_err();
    assert!(err.is_vanished());
}

#[test]
fn test_seeded_table_is_returned_after_failure() {
    let tree = tree_a();
    let root = tree.path();
    let mut seeded = RegistrationTable::new();
    seeded.record(WatchHandle::new(100), Path::new("/elsewhere"));

    let mut service = ScriptedService {
        exhausted: vec![root.join("c")],
        ..ScriptedService::default()
    };
    let mut registrar =
        Registrar::new(&mut service, RegistrationPolicy::default()).with_table(seeded);

    assert!(registrar.register_recursive([root]).is_err());
    let table = registrar.into_table().unwrap();

    // seeded entry plus a and a/b
    assert_eq!(table.len(), 3);
    assert!(table.contains_path(Path::new("/elsewhere")));
    assert!(table.contains_path(&root.join("b")));
}

#[test]
fn test_events_delivered_for_registered_subdirectory() {
    let tree = tree_a();
    let sub = tree.path().join("c");
    let (mut service, events) = NotifyWatchService::new().unwrap();
    watcher::register_recursive(&mut service, RegistrationPolicy::default(), [tree.path()])
        .unwrap();

    let created = sub.join("new.txt");
    fs::write(&created, "hello").unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut seen = false;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(remaining) {
            Ok(event)
                if event.kind.is_create()
                    && event.paths.iter().any(|p| p.ends_with("new.txt")) =>
            {
                seen = true;
                break;
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }

    assert!(seen, "expected a create event for {}", created.display());
    service.close().unwrap();
}
