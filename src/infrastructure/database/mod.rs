//! Embedded SQLite store: connection handling, idempotent schema, and the
//! repositories every other component goes through.

pub mod app_repo;
pub mod connection;
pub mod interaction_repo;
pub mod registry_repo;
mod schema;
pub mod utils;
pub mod workflow_repo;

pub use app_repo::AppRepository;
pub use connection::StoreHandle;
pub use interaction_repo::InteractionRepository;
pub use registry_repo::RegistryRepository;
pub use workflow_repo::WorkflowRepository;
