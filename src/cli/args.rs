//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Recursive directory registration for file-change notifications
#[derive(Parser)]
#[command(
    name = "dirwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Register directory trees with the platform file watcher",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up .dirwatch directory
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// Register directories and all their subdirectories for change notifications
    Register {
        /// Starting directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Fail if a directory vanishes during registration
        #[arg(long, conflicts_with = "lenient")]
        strict: bool,

        /// Skip directories that vanish during registration
        #[arg(long)]
        lenient: bool,

        /// Do not keep a handle -> path table
        #[arg(long)]
        no_table: bool,

        /// Descend into symlinked directories
        #[arg(long)]
        follow_links: bool,

        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },
}
