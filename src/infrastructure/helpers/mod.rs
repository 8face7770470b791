//! Out-of-process helper adapters: the LLM helper subprocess and the
//! embedding HTTP endpoint.

pub mod embedding;
pub mod llm;

pub use embedding::HttpEmbeddingClient;
pub use llm::LlmHelperProcess;
