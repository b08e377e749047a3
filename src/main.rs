use anyhow::{Result, anyhow};
use clap::Parser;

use dirwatch::cli::commands::{init, register};
use dirwatch::cli::{Cli, Commands};
use dirwatch::{Settings, logging};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow!("Failed to load settings: {e}"))?;

    logging::init_with_config(&settings.logging);
    dirwatch::debug_event!("cli", "starting", "dirwatch v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Init { force } => init::run_init(force),
        Commands::Config => init::run_config(&settings),
        Commands::Register {
            paths,
            strict,
            lenient,
            no_table,
            follow_links,
            json,
        } => {
            let policy = register::PolicyOverrides {
                strict,
                lenient,
                no_table,
                follow_links,
            }
            .apply(settings.watch);
            register::run(&paths, policy, json)
        }
    }
}
