//! Deferred runs.
//!
//! In suspend mode a long WAIT parks the run here: its next step index, the
//! variable context and the log so far. The resume scheduler takes due runs
//! and hands them back to the interpreter.

use crate::context::VariableContext;
use crate::error::DeferredError;
use crate::execution::StepLogEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_core::{ExecutionId, WorkflowId};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// A suspended run waiting for its due time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredRun {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    /// Index of the first step still to run.
    pub next_step: usize,
    pub context: VariableContext,
    pub log: Vec<StepLogEntry>,
    pub due_at: DateTime<Utc>,
}

/// Durable queue of deferred runs.
#[async_trait]
pub trait DeferredRunQueue: Send + Sync {
    /// Stores a run until `due_at`.
    async fn enqueue(&self, run: DeferredRun) -> Result<(), Report<DeferredError>>;

    /// Removes and returns every run due at or before `now`.
    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<DeferredRun>, Report<DeferredError>>;
}

/// Queue kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDeferredQueue {
    runs: Mutex<Vec<DeferredRun>>,
}

impl InMemoryDeferredQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs waiting.
    pub async fn len(&self) -> usize {
        self.runs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.lock().await.is_empty()
    }
}

#[async_trait]
impl DeferredRunQueue for InMemoryDeferredQueue {
    async fn enqueue(&self, run: DeferredRun) -> Result<(), Report<DeferredError>> {
        self.runs.lock().await.push(run);
        Ok(())
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<DeferredRun>, Report<DeferredError>> {
        let mut runs = self.runs.lock().await;
        let (mut due, pending): (Vec<_>, Vec<_>) =
            runs.drain(..).partition(|run| run.due_at <= now);
        *runs = pending;
        due.sort_by_key(|run| run.due_at);
        Ok(due)
    }
}
