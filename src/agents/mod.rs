//! Agent adapter core
//!
//! Normalizes OpenAI-compatible, Fireworks, and Gemini APIs into one
//! conversation contract with blocking and streamed completions.
//!
//! ## Architecture
//!
//! - `config` - Per-request AgentConfig and provider selection
//! - `domain/` - Messages, finish signals, stream events
//! - `llm/` - Provider backends, HTTP client, fragment streams
//! - `continuation` - Truncation recovery for blocking calls
//! - `adapter` - `AgentAdapter::converse` / `converse_stream`

pub mod adapter;
pub mod config;
pub mod continuation;
pub mod domain;
pub mod error;
pub mod llm;

// Re-export commonly used types
pub use adapter::{AgentAdapter, CompletionResult};
pub use config::*;
pub use domain::*;
pub use error::*;
