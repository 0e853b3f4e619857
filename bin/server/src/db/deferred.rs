//! Deferred runs in Postgres.

use super::decode_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_core::{ExecutionId, WorkflowId};
use nurture_workflow::{
    DeferredError, DeferredRun, DeferredRunQueue, StepLogEntry, VariableContext,
};
use rootcause::Report;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

#[derive(FromRow)]
struct DeferredRow {
    execution_id: String,
    workflow_id: String,
    next_step: i32,
    context: Json<VariableContext>,
    log: Json<Vec<StepLogEntry>>,
    due_at: DateTime<Utc>,
}

impl DeferredRow {
    fn try_into_run(self) -> Result<DeferredRun, sqlx::Error> {
        let execution_id = ExecutionId::from_str(&self.execution_id)
            .map_err(|e| decode_error("execution id", &self.execution_id, e))?;
        let workflow_id = WorkflowId::from_str(&self.workflow_id)
            .map_err(|e| decode_error("workflow id", &self.workflow_id, e))?;
        let next_step = usize::try_from(self.next_step)
            .map_err(|e| decode_error("step index", &self.next_step.to_string(), e))?;

        Ok(DeferredRun {
            execution_id,
            workflow_id,
            next_step,
            context: self.context.0,
            log: self.log.0,
            due_at: self.due_at,
        })
    }
}

fn storage_failed(e: sqlx::Error) -> DeferredError {
    DeferredError::StorageFailed {
        reason: e.to_string(),
    }
}

/// Deferred-run queue backed by the `deferred_runs` table.
#[derive(Debug, Clone)]
pub struct PgDeferredQueue {
    pool: PgPool,
}

impl PgDeferredQueue {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeferredRunQueue for PgDeferredQueue {
    async fn enqueue(&self, run: DeferredRun) -> Result<(), Report<DeferredError>> {
        let next_step = i32::try_from(run.next_step).map_err(|e| DeferredError::StorageFailed {
            reason: format!("step index {} out of range: {e}", run.next_step),
        })?;

        sqlx::query(
            r#"
            INSERT INTO deferred_runs (execution_id, workflow_id, next_step, context, log, due_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (execution_id) DO UPDATE SET
                next_step = EXCLUDED.next_step,
                context = EXCLUDED.context,
                log = EXCLUDED.log,
                due_at = EXCLUDED.due_at
            "#,
        )
        .bind(run.execution_id.to_string())
        .bind(run.workflow_id.to_string())
        .bind(next_step)
        .bind(Json(&run.context))
        .bind(Json(&run.log))
        .bind(run.due_at)
        .execute(&self.pool)
        .await
        .map_err(storage_failed)?;
        Ok(())
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<DeferredRun>, Report<DeferredError>> {
        let rows: Vec<DeferredRow> = sqlx::query_as(
            r#"
            DELETE FROM deferred_runs
            WHERE due_at <= $1
            RETURNING execution_id, workflow_id, next_step, context, log, due_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)?;

        let mut runs = rows
            .into_iter()
            .map(DeferredRow::try_into_run)
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_failed)?;
        runs.sort_by_key(|run| run.due_at);
        Ok(runs)
    }
}
