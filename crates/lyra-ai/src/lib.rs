//! Core library surface for the crates crate.
mod openai_compat;
mod types;

pub use openai_compat::{client_from_env, OpenAiCompatClient, OpenAiCompatConfig};
pub use types::{
    ChatCompletion, ChatMessage, ChatRequest, ChatRole, ChatUsage, LlmClient, LyraAiError,
};
