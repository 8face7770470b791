//! Domain ports (interfaces) for the Octant core.
//!
//! External collaborators are consumed through these traits; the
//! infrastructure layer provides the real implementations and the null
//! variants keep headless runs and tests honest.

pub mod embedding;
pub mod foreground;
pub mod input;
pub mod llm_helper;
pub mod null_os;
pub mod registry_search;

pub use embedding::EmbeddingClient;
pub use foreground::{ForegroundApp, ForegroundProbe, UiElement};
pub use input::{InputInjector, VkCode};
pub use llm_helper::{LlmHelper, OrchestrationChoice, SuggestedAction, ToolSummary, WorkflowAnalysis};
pub use null_os::{NullForegroundProbe, NullInputInjector};
pub use registry_search::RegistrySearch;
