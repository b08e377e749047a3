pub mod cli;
pub mod config;
pub mod logging;
pub mod watcher;

pub use config::{LoggingConfig, Settings};
pub use watcher::{
    NotifyWatchService, RegisterOutcome, Registrar, Registration, RegistrationPolicy,
    RegistrationSummary, RegistrationTable, WatchError, WatchHandle, WatchService,
};
