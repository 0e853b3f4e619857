//! Error types for the scheduler crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SchedulerError`: wraps deferred-queue and store failures

use nurture_core::{ExecutionId, WorkflowId};
use std::fmt;

/// Scheduler errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Due runs could not be taken from the queue.
    QueueUnavailable,
    /// The workflow of a deferred run could not be loaded.
    LoadWorkflow { workflow_id: WorkflowId },
    /// A deferred run could not be resumed.
    Resume { execution_id: ExecutionId },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueUnavailable => write!(f, "could not take due runs from the deferred queue"),
            Self::LoadWorkflow { workflow_id } => {
                write!(f, "could not load workflow {workflow_id}")
            }
            Self::Resume { execution_id } => {
                write!(f, "could not resume execution {execution_id}")
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let id = ExecutionId::new();
        let err = SchedulerError::Resume { execution_id: id };
        assert_eq!(err.to_string(), format!("could not resume execution {id}"));
        assert!(
            SchedulerError::QueueUnavailable
                .to_string()
                .contains("deferred queue")
        );
    }
}
