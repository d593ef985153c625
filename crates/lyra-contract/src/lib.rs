//! Conversation contract schema and validation helpers.
//!
//! This crate defines the closed enumerations and inbound message schema
//! shared by routing, storage, and gateway entrypoints. Validation here
//! rejects malformed input before any state mutation so downstream code
//! only consumes well-formed contract values.

pub mod conversation_contract;

pub use conversation_contract::*;
