//! Scheduler for suspended workflow runs.
//!
//! This crate provides:
//!
//! - **Resume Scheduler**: polls the deferred-run queue and hands due runs
//!   back to the interpreter

pub mod error;
pub mod resume;

pub use error::SchedulerError;
pub use resume::{ResumeScheduler, TickReport};
