//! Register command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::watcher::{
    NotifyWatchService, Registrar, RegistrationPolicy, RegistrationSummary, RegistrationTable,
    WatchService,
};

/// Flags from the command line that override the configured policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyOverrides {
    pub strict: bool,
    pub lenient: bool,
    pub no_table: bool,
    pub follow_links: bool,
}

impl PolicyOverrides {
    pub fn apply(self, mut policy: RegistrationPolicy) -> RegistrationPolicy {
        if self.strict {
            policy.ignore_vanished = false;
        }
        if self.lenient {
            policy.ignore_vanished = true;
        }
        if self.no_table {
            policy.track_table = false;
        }
        if self.follow_links {
            policy.follow_links = true;
        }
        policy
    }
}

#[derive(Debug, Serialize)]
struct RegisterReport {
    policy: RegistrationPolicy,
    summary: RegistrationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    table: Option<RegistrationTable>,
}

/// Run register command - register every directory under `paths` with the
/// platform watcher, print what happened and close the session.
pub fn run(paths: &[PathBuf], policy: RegistrationPolicy, json: bool) -> Result<()> {
    let (mut service, _events) =
        NotifyWatchService::new().context("Failed to open watch service")?;

    let mut registrar = Registrar::new(&mut service, policy);
    let result = registrar.register_recursive(paths);
    let table = registrar.into_table();

    if let Err(e) = service.close() {
        tracing::warn!("[watcher] failed to close watch service: {e}");
    }

    let summary = result.context("Registration failed")?;
    let report = RegisterReport {
        policy,
        summary,
        table,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &RegisterReport) {
    let summary = &report.summary;
    println!(
        "Registered {} directories under {} root(s)",
        summary.registered_count(),
        summary.roots.len()
    );

    if !summary.is_complete() {
        println!("Skipped {} vanished path(s):", summary.skipped_count());
        for skipped in &summary.skipped {
            println!("  - {}", skipped.path.display());
        }
    }

    if let Some(table) = &report.table {
        println!("Table: {} entries", table.len());
    }
}
