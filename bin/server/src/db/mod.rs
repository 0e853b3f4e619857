//! Postgres implementations of the engine's persistence contracts.
//!
//! - [`PgWorkflowStore`]: workflow definitions
//! - [`PgExecutionLedger`]: one row per run, log kept as JSONB
//! - [`PgDeferredQueue`]: suspended runs waiting for their due time
//!
//! Ids are stored as their prefixed text form.

pub mod deferred;
pub mod ledger;
pub mod workflow;

pub use deferred::PgDeferredQueue;
pub use ledger::PgExecutionLedger;
pub use workflow::PgWorkflowStore;

/// Wraps a column that does not decode into a domain value.
fn decode_error(what: &str, value: &str, reason: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid {what} '{value}': {reason}"),
    )))
}
