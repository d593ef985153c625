//! Core library surface for the crates crate.
mod persona;
mod reply_generator;

pub use persona::{default_system_prompt, PersonaConfig};
pub use reply_generator::{AgentReply, ReplyGenerator, ReplySource, DEFAULT_HISTORY_LIMIT};
