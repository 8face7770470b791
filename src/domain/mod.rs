//! Domain layer for the Octant action broker
//!
//! Core business entities, ports, and error types. Framework-agnostic;
//! no infrastructure concerns.

pub mod error;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use error::{CoreError, CoreResult, ErrorKind};
