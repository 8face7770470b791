//! Tool-server integration: long-lived child processes speaking JSON-RPC
//! 2.0 over line-delimited stdio, pooled per server name.

pub mod error;
pub mod pool;
pub mod protocol;
pub mod transport;

pub use error::McpError;
pub use pool::{PoolTimeouts, ToolClientPool};
pub use protocol::{McpToolDef, ToolCallResult};
pub use transport::StdioClient;
