//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StepError`: a handler could not run the step at all (fatal to the run)
//! - `LedgerError`, `StoreError`, `DeferredError`: persistence contracts
//! - `ValidationError`: a definition rejected at save time
//! - `ExecutionError`, `DispatchError`: run and dispatch level wrappers, used
//!   as `.context()` over the persistence errors

use crate::execution::ExecutionStatus;
use crate::step::StepKind;
use nurture_core::{ExecutionId, WorkflowId};
use std::fmt;

/// A step could not be executed.
///
/// Ordinary delivery failures are not errors; they come back as a `FAILED`
/// outcome. A `StepError` ends the whole run with status `FAILED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The step's configuration cannot be executed.
    InvalidConfig { kind: StepKind, reason: String },
    /// The handler panicked.
    Panicked { kind: StepKind, message: String },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { kind, reason } => {
                write!(f, "invalid {kind} step configuration: {reason}")
            }
            Self::Panicked { kind, message } => {
                write!(f, "{kind} handler panicked: {message}")
            }
        }
    }
}

impl std::error::Error for StepError {}

/// Errors from the execution ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No record with this id.
    NotFound { id: ExecutionId },
    /// The record already reached a terminal status.
    AlreadyTerminal {
        id: ExecutionId,
        status: ExecutionStatus,
    },
    /// `finalize` was called with a non-terminal status.
    NonTerminalStatus { status: ExecutionStatus },
    /// The backing storage failed.
    StorageFailed { reason: String },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "execution not found: {id}"),
            Self::AlreadyTerminal { id, status } => {
                write!(f, "execution {id} is already {status}")
            }
            Self::NonTerminalStatus { status } => {
                write!(f, "cannot finalize with non-terminal status {status}")
            }
            Self::StorageFailed { reason } => write!(f, "ledger storage failed: {reason}"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Errors from the workflow store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The definition failed validation.
    Invalid(ValidationError),
    /// The backing storage failed.
    StorageFailed { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(e) => write!(f, "invalid workflow: {e}"),
            Self::StorageFailed { reason } => write!(f, "workflow storage failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from the deferred-run queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredError {
    /// The backing storage failed.
    StorageFailed { reason: String },
}

impl fmt::Display for DeferredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { reason } => write!(f, "deferred queue storage failed: {reason}"),
        }
    }
}

impl std::error::Error for DeferredError {}

/// A workflow definition that cannot be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The workflow has no name.
    EmptyName,
    /// A condition step does not name a variable.
    EmptyConditionVariable { index: usize },
    /// An email step has neither subject nor body.
    EmptyEmail { index: usize },
    /// A retry policy allows no attempts or too many.
    InvalidRetry { index: usize, max_attempts: u32 },
    /// A per-step timeout of zero.
    ZeroTimeout { index: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "workflow name is empty"),
            Self::EmptyConditionVariable { index } => {
                write!(f, "step {index}: condition has no variable")
            }
            Self::EmptyEmail { index } => {
                write!(f, "step {index}: email has neither subject nor body")
            }
            Self::InvalidRetry {
                index,
                max_attempts,
            } => {
                write!(f, "step {index}: retry max_attempts {max_attempts} out of range")
            }
            Self::ZeroTimeout { index } => write!(f, "step {index}: timeout must be positive"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Run-level errors (use as context wrapper over ledger/queue errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The ledger record could not be created.
    Start { workflow_id: WorkflowId },
    /// Progress could not be persisted mid-run.
    Persist { execution_id: ExecutionId },
    /// A long wait could not be deferred.
    Defer { execution_id: ExecutionId },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start { workflow_id } => {
                write!(f, "could not start execution of workflow {workflow_id}")
            }
            Self::Persist { execution_id } => {
                write!(f, "could not persist progress of execution {execution_id}")
            }
            Self::Defer { execution_id } => {
                write!(f, "could not defer execution {execution_id}")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Dispatch-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Active workflows could not be listed.
    StoreUnavailable,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreUnavailable => write!(f, "could not list active workflows"),
        }
    }
}

impl std::error::Error for DispatchError {}
