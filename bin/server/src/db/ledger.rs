//! Execution records in Postgres.
//!
//! Writes are conditional on the record still being `PENDING` or `WAITING`,
//! so a terminal row is never touched again even with concurrent writers.

use super::decode_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_core::{ExecutionId, WorkflowId};
use nurture_workflow::{
    ExecutionLedger, ExecutionRecord, ExecutionStatus, LedgerError, StepLogEntry,
};
use rootcause::Report;
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for execution queries.
#[derive(FromRow)]
struct ExecutionRow {
    id: String,
    workflow_id: String,
    status: String,
    input: JsonValue,
    log: Json<Vec<StepLogEntry>>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRow {
    fn try_into_record(self) -> Result<ExecutionRecord, sqlx::Error> {
        let id = ExecutionId::from_str(&self.id)
            .map_err(|e| decode_error("execution id", &self.id, e))?;
        let workflow_id = WorkflowId::from_str(&self.workflow_id)
            .map_err(|e| decode_error("workflow id", &self.workflow_id, e))?;
        let status = ExecutionStatus::from_str(&self.status)
            .map_err(|e| decode_error("execution status", &self.status, e))?;

        Ok(ExecutionRecord {
            id,
            workflow_id,
            status,
            input: self.input,
            log: self.log.0,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

fn storage_failed(e: sqlx::Error) -> LedgerError {
    LedgerError::StorageFailed {
        reason: e.to_string(),
    }
}

/// Execution ledger backed by the `executions` table.
#[derive(Debug, Clone)]
pub struct PgExecutionLedger {
    pool: PgPool,
}

impl PgExecutionLedger {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies a write to a non-terminal record.
    async fn write(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        log: &[StepLogEntry],
    ) -> Result<(), Report<LedgerError>> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = $2,
                log = $3,
                completed_at = CASE WHEN $4 THEN NOW() ELSE completed_at END
            WHERE id = $1 AND status IN ('PENDING', 'WAITING')
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(Json(log))
        .bind(status.is_terminal())
        .execute(&self.pool)
        .await
        .map_err(storage_failed)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.get(id).await? {
            None => Err(LedgerError::NotFound { id }.into()),
            Some(record) => Err(LedgerError::AlreadyTerminal {
                id,
                status: record.status,
            }
            .into()),
        }
    }
}

#[async_trait]
impl ExecutionLedger for PgExecutionLedger {
    async fn create(
        &self,
        workflow_id: WorkflowId,
        input: &JsonValue,
    ) -> Result<ExecutionId, Report<LedgerError>> {
        let record = ExecutionRecord::new(workflow_id, input.clone());
        sqlx::query(
            r#"
            INSERT INTO executions (id, workflow_id, status, input, log, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id.to_string())
        .bind(workflow_id.to_string())
        .bind(record.status.as_str())
        .bind(&record.input)
        .bind(Json(&record.log))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_failed)?;
        Ok(record.id)
    }

    async fn append_progress(
        &self,
        id: ExecutionId,
        log: &[StepLogEntry],
    ) -> Result<(), Report<LedgerError>> {
        self.write(id, ExecutionStatus::Pending, log).await
    }

    async fn suspend(
        &self,
        id: ExecutionId,
        log: &[StepLogEntry],
    ) -> Result<(), Report<LedgerError>> {
        self.write(id, ExecutionStatus::Waiting, log).await
    }

    async fn finalize(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        log: &[StepLogEntry],
    ) -> Result<(), Report<LedgerError>> {
        if !status.is_terminal() {
            return Err(LedgerError::NonTerminalStatus { status }.into());
        }
        self.write(id, status, log).await
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, Report<LedgerError>> {
        let row: Option<ExecutionRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, status, input, log, created_at, completed_at
            FROM executions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failed)?;

        let record = row
            .map(ExecutionRow::try_into_record)
            .transpose()
            .map_err(storage_failed)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nurture_workflow::{StepKind, StepOutcome, StepStatus};

    #[test]
    fn row_converts_to_record() {
        let id = ExecutionId::new();
        let row = ExecutionRow {
            id: id.to_string(),
            workflow_id: WorkflowId::new().to_string(),
            status: "CANCELLED".to_string(),
            input: serde_json::json!({"source": "organic"}),
            log: Json(vec![StepLogEntry::new(
                0,
                StepKind::Condition,
                StepOutcome::condition(false, "source equals ads: false"),
            )]),
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        let record = row.try_into_record().expect("valid row");
        assert_eq!(record.id, id);
        assert_eq!(record.status, ExecutionStatus::Cancelled);
        assert_eq!(record.log[0].status, StepStatus::False);
    }

    #[test]
    fn unknown_status_is_a_decode_error() {
        let row = ExecutionRow {
            id: ExecutionId::new().to_string(),
            workflow_id: WorkflowId::new().to_string(),
            status: "RUNNING".to_string(),
            input: JsonValue::Null,
            log: Json(Vec::new()),
            created_at: Utc::now(),
            completed_at: None,
        };
        let err = row.try_into_record().expect_err("bad status");
        assert!(err.to_string().contains("invalid execution status"));
    }
}
