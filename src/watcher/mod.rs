//! Directory registration for platform file-change notifications.
//!
//! This module registers directory trees with a watch service and keeps
//! track of which handle watches which directory. It does not consume
//! events; that is left to the caller.
//!
//! # Architecture
//!
//! ```text
//! Registrar::register_recursive(starting paths)
//!   - walkdir pre-order traversal
//!   - Registrar::register per directory
//!         |
//!    WatchService (trait)          RegistrationTable
//!    NotifyWatchService  --handle-->  handle -> path
//! ```

mod error;
mod registrar;
mod service;
mod table;

pub use error::{ErrorClass, WatchError};
pub use registrar::{
    RegisterOutcome, Registrar, Registration, RegistrationPolicy, RegistrationSummary,
    SkippedPath,
};
pub use service::{
    EventKinds, NotifyWatchService, Sensitivity, WatchHandle, WatchRequest, WatchService,
};
pub use table::{RegistrationTable, TableUpdate};

/// Register `starting_paths` recursively and return the summary together
/// with the table, if the policy tracks one.
pub fn register_recursive<S, I, P>(
    service: &mut S,
    policy: RegistrationPolicy,
    starting_paths: I,
) -> Result<(RegistrationSummary, Option<RegistrationTable>), WatchError>
where
    S: WatchService + ?Sized,
    I: IntoIterator<Item = P>,
    P: AsRef<std::path::Path>,
{
    let mut registrar = Registrar::new(service, policy);
    let summary = registrar.register_recursive(starting_paths)?;
    Ok((summary, registrar.into_table()))
}
