//! HTTP surface of the Leadex lead-distribution service.
//!
//! The server wires the core services (intake, claim resolution, fanout,
//! expiry sweeping) to an Axum router. All winner-deciding writes happen in
//! `leadex-core`; handlers here only parse, delegate, and shape responses.

pub mod errors;
pub mod handlers;
pub mod infra;
pub mod middleware;
pub mod routes;

pub use errors::{AppError, AppResult};
pub use infra::app_state::AppState;
pub use infra::config::Config;
