//! Octant - context-aware desktop action broker
//!
//! Watches the foreground application, discovers tool servers for it, and
//! materialises a per-app ring of eight invokable actions:
//! - Registry resolution cascade with negative caching
//! - Long-lived tool-server processes over JSON-RPC stdio
//! - Keybind / tool-call / inline-script dispatch
//! - Behavioural learning loop (interactions -> workflows -> clusters -> re-ranking)
//! - SQLite persistence with WAL mode

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use crate::core::Core;
pub use infrastructure::database::StoreHandle;
