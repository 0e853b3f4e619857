//! nurture trigger intake server.
//!
//! Wires the workflow engine to its production collaborators: Postgres for
//! workflows, execution records and deferred runs, HTTP providers for
//! delivery, and an axum router that accepts trigger events.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
