//! # Starwatch Gateway
//! Small HTTP API beside the poller: liveness, poller status and an
//! authenticated manual trigger for one star check.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
