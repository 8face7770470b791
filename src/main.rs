//! Octant CLI entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use octant::cli::{commands, Cli, Commands};
use octant::domain::ports::{NullForegroundProbe, NullInputInjector};
use octant::infrastructure::config::ConfigLoader;
use octant::infrastructure::logging;
use octant::Core;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load().context("Failed to load configuration")?,
    };

    let _log_guard = logging::init(&config.logging);

    match cli.command {
        Commands::Run => {
            // The OS collaborators are host-provided integrations; this
            // binary wires the null ports, so a bare `run` exercises the
            // timers and store without touching the desktop.
            tracing::warn!(
                "running with null OS collaborators; no foreground changes will be observed"
            );
            let core = Core::bootstrap(
                config,
                Arc::new(NullForegroundProbe),
                Arc::new(NullInputInjector),
            )
            .await
            .context("Failed to bootstrap core")?;

            core.start().await;
            tracing::info!("octant running, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            core.shutdown().await;
        }
        Commands::Resolve { ref app, refresh } => {
            commands::handle_resolve(&config, app, refresh).await?;
        }
        Commands::Ring { ref app } => {
            commands::handle_ring(&config, app).await?;
        }
        Commands::Apps => {
            commands::handle_apps(&config).await?;
        }
        Commands::Delete { ref app } => {
            commands::handle_delete(&config, app).await?;
        }
        Commands::Sweep => {
            commands::handle_sweep(&config).await?;
        }
    }

    Ok(())
}
