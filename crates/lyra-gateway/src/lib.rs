//! Core library surface for the crates crate.
mod http_api;
mod server_runtime;

pub use http_api::{build_gateway_router, GatewayState};
pub use server_runtime::{init_tracing, run_gateway_server, GatewayServerConfig};
