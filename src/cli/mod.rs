//! Operator CLI.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Context-aware desktop action broker.
#[derive(Debug, Parser)]
#[command(name = "octant", version, about)]
pub struct Cli {
    /// Load configuration from a specific file instead of `.octant/`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the broker daemon (foreground poll, sweep, workflow pipeline).
    Run,
    /// Resolve an app name to a tool server through the cascade.
    Resolve {
        /// Application process name, e.g. `chrome.exe`.
        app: String,
        /// Ignore the cache entry for this app before resolving.
        #[arg(long)]
        refresh: bool,
    },
    /// Show the persisted ring for an app.
    Ring {
        /// Application process name.
        app: String,
    },
    /// List every known app.
    Apps,
    /// Delete an app and everything attached to it.
    Delete {
        /// Application process name.
        app: String,
    },
    /// Sweep expired interactions now.
    Sweep,
}
