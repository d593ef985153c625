//! Core library surface for the crates crate.
mod outbound_queue;

pub use outbound_queue::{OutboundJob, OutboundQueue};
