//! Core domain types and utilities for the nurture automation engine.
//!
//! This crate provides the identifiers and the error handling foundation
//! shared by the workflow engine, its integrations and the intake server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ExecutionId, ParseIdError, TenantId, WorkflowId};
