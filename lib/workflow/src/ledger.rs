//! The execution ledger contract and its in-memory implementation.
//!
//! Every run owns one record. The interpreter creates it before the first
//! step, replaces its log after every step and finalizes it once.

use crate::error::LedgerError;
use crate::execution::{ExecutionRecord, ExecutionStatus, StepLogEntry};
use async_trait::async_trait;
use nurture_core::{ExecutionId, WorkflowId};
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Persists execution records.
#[async_trait]
pub trait ExecutionLedger: Send + Sync {
    /// Creates a `PENDING` record and returns its id.
    async fn create(
        &self,
        workflow_id: WorkflowId,
        input: &JsonValue,
    ) -> Result<ExecutionId, Report<LedgerError>>;

    /// Replaces the log of a running record.
    async fn append_progress(
        &self,
        id: ExecutionId,
        log: &[StepLogEntry],
    ) -> Result<(), Report<LedgerError>>;

    /// Marks a record `WAITING` with its log so far.
    async fn suspend(&self, id: ExecutionId, log: &[StepLogEntry])
    -> Result<(), Report<LedgerError>>;

    /// Writes the terminal status and final log.
    async fn finalize(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        log: &[StepLogEntry],
    ) -> Result<(), Report<LedgerError>>;

    /// Loads a record.
    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, Report<LedgerError>>;
}

/// Ledger kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: Mutex<HashMap<ExecutionId, ExecutionRecord>>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, oldest first.
    pub async fn records(&self) -> Vec<ExecutionRecord> {
        let mut records: Vec<_> = self.records.lock().await.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        records
    }

    async fn update(
        &self,
        id: ExecutionId,
        apply: impl FnOnce(&mut ExecutionRecord) -> Result<(), LedgerError> + Send,
    ) -> Result<(), Report<LedgerError>> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(&id).ok_or(LedgerError::NotFound { id })?;
        apply(record)?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionLedger for InMemoryLedger {
    async fn create(
        &self,
        workflow_id: WorkflowId,
        input: &JsonValue,
    ) -> Result<ExecutionId, Report<LedgerError>> {
        let record = ExecutionRecord::new(workflow_id, input.clone());
        let id = record.id;
        self.records.lock().await.insert(id, record);
        Ok(id)
    }

    async fn append_progress(
        &self,
        id: ExecutionId,
        log: &[StepLogEntry],
    ) -> Result<(), Report<LedgerError>> {
        self.update(id, |record| record.record_progress(log.to_vec()))
            .await
    }

    async fn suspend(
        &self,
        id: ExecutionId,
        log: &[StepLogEntry],
    ) -> Result<(), Report<LedgerError>> {
        self.update(id, |record| record.suspend(log.to_vec())).await
    }

    async fn finalize(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        log: &[StepLogEntry],
    ) -> Result<(), Report<LedgerError>> {
        self.update(id, |record| record.finalize(status, log.to_vec()))
            .await
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, Report<LedgerError>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{StepOutcome, StepStatus};
    use crate::step::StepKind;

    fn entry(index: usize) -> StepLogEntry {
        StepLogEntry::new(index, StepKind::Log, StepOutcome::success("logged"))
    }

    #[tokio::test]
    async fn create_then_progress_then_finalize() {
        let ledger = InMemoryLedger::new();
        let id = ledger
            .create(WorkflowId::new(), &serde_json::json!({"name": "Ana"}))
            .await
            .expect("create");

        let record = ledger.get(id).await.expect("get").expect("exists");
        assert_eq!(record.status, ExecutionStatus::Pending);
        assert_eq!(record.input["name"], "Ana");

        ledger
            .append_progress(id, &[entry(0)])
            .await
            .expect("progress");
        ledger
            .finalize(id, ExecutionStatus::Success, &[entry(0), entry(1)])
            .await
            .expect("finalize");

        let record = ledger.get(id).await.expect("get").expect("exists");
        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.log.len(), 2);
        assert_eq!(record.log[1].status, StepStatus::Success);
    }

    #[tokio::test]
    async fn terminal_records_reject_writes() {
        let ledger = InMemoryLedger::new();
        let id = ledger
            .create(WorkflowId::new(), &serde_json::json!({}))
            .await
            .expect("create");
        ledger
            .finalize(id, ExecutionStatus::Cancelled, &[entry(0)])
            .await
            .expect("finalize");

        let err = ledger
            .append_progress(id, &[entry(0), entry(1)])
            .await
            .expect_err("terminal");
        assert!(err.to_string().contains("already CANCELLED"));

        let record = ledger.get(id).await.expect("get").expect("exists");
        assert_eq!(record.log.len(), 1);
    }

    #[tokio::test]
    async fn unknown_record() {
        let ledger = InMemoryLedger::new();
        let missing = ExecutionId::new();
        assert!(ledger.get(missing).await.expect("get").is_none());
        let err = ledger
            .suspend(missing, &[])
            .await
            .expect_err("missing");
        assert!(err.to_string().contains("not found"));
    }
}
