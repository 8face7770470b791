//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::domain::models::LoggingConfig;

/// Initialise the global subscriber from config. `RUST_LOG` wins over the
/// configured level when set. Returns a guard that must stay alive for the
/// process lifetime when file logging is enabled.
pub fn init(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if let Some(directory) = &config.directory {
        let appender = tracing_appender::rolling::daily(directory, "octant.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        if config.format == "json" {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
        }
        return Some(guard);
    }

    if config.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    None
}
