//! Error types for directory registration.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from registering directories with a watch service.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watch service: {reason}")]
    InitFailed { reason: String },

    #[error("Path vanished before it could be watched: {}", path.display())]
    PathVanished { path: PathBuf },

    #[error("Cannot watch path {}: {reason}", path.display())]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Watch descriptor limit reached while watching {}", path.display())]
    LimitReached { path: PathBuf },

    #[error("Failed to traverse {}: {source}", path.display())]
    TraversalFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Watch service is closed")]
    ServiceClosed,
}

/// Coarse classification used to decide whether an error may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The target vanished between discovery and registration.
    TransientNotFound,
    /// The platform refused the registration (permissions, descriptor limits).
    PlatformRegistrationFailure,
    /// Listing a directory failed for a reason other than a missing entry.
    TraversalFailure,
    /// Service lifecycle and configuration problems.
    Other,
}

impl WatchError {
    /// Classify a `notify` error raised while watching `path`.
    pub fn from_notify(path: impl Into<PathBuf>, err: notify::Error) -> Self {
        let path = path.into();
        match err.kind {
            notify::ErrorKind::PathNotFound => WatchError::PathVanished { path },
            notify::ErrorKind::Io(ref io_err) if io_err.kind() == io::ErrorKind::NotFound => {
                WatchError::PathVanished { path }
            }
            notify::ErrorKind::MaxFilesWatch => WatchError::LimitReached { path },
            _ => WatchError::PathWatchFailed {
                path,
                reason: err.to_string(),
            },
        }
    }

    /// Classify an error raised by the directory walk.
    pub fn from_walk(err: walkdir::Error) -> Self {
        let path = err.path().map(PathBuf::from).unwrap_or_default();
        let not_found = err
            .io_error()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound);

        if not_found {
            return WatchError::PathVanished { path };
        }

        let source = match err.into_io_error() {
            Some(io_err) => io_err,
            // Symlink loops carry no io::Error
            None => io::Error::other("filesystem loop detected"),
        };
        WatchError::TraversalFailed { path, source }
    }

    /// True if the target path no longer exists.
    pub fn is_vanished(&self) -> bool {
        matches!(self, WatchError::PathVanished { .. })
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            WatchError::PathVanished { .. } => ErrorClass::TransientNotFound,
            WatchError::PathWatchFailed { .. } | WatchError::LimitReached { .. } => {
                ErrorClass::PlatformRegistrationFailure
            }
            WatchError::TraversalFailed { .. } => ErrorClass::TraversalFailure,
            WatchError::InitFailed { .. } | WatchError::ServiceClosed => ErrorClass::Other,
        }
    }
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
