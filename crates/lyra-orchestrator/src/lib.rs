//! Core library surface for the crates crate.
mod console_surface;
mod inbound_pipeline;
mod orchestrator_errors;

pub use console_surface::{
    ConversationDetail, ModeChange, ReplyReceipt, OPERATOR_CONSOLE_CHANNEL,
};
pub use inbound_pipeline::{InboundOutcome, Orchestrator};
pub use orchestrator_errors::OrchestratorError;
