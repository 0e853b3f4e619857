//! Workflow definitions in Postgres.

use super::decode_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_core::{TenantId, WorkflowId};
use nurture_workflow::{Step, StoreError, TriggerFilter, TriggerKind, WorkflowDefinition, WorkflowStore};
use rootcause::Report;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for workflow queries.
#[derive(FromRow)]
struct WorkflowRow {
    id: String,
    tenant_id: String,
    name: String,
    trigger_kind: String,
    trigger_filter: Json<TriggerFilter>,
    steps: Json<Vec<Step>>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    fn try_into_definition(self) -> Result<WorkflowDefinition, sqlx::Error> {
        let id = WorkflowId::from_str(&self.id)
            .map_err(|e| decode_error("workflow id", &self.id, e))?;
        let tenant_id = TenantId::from_str(&self.tenant_id)
            .map_err(|e| decode_error("tenant id", &self.tenant_id, e))?;
        let trigger = TriggerKind::from_str(&self.trigger_kind)
            .map_err(|e| decode_error("trigger kind", &self.trigger_kind, e))?;

        Ok(WorkflowDefinition {
            id,
            tenant_id,
            name: self.name,
            trigger,
            trigger_filter: self.trigger_filter.0,
            steps: self.steps.0,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn storage_failed(e: sqlx::Error) -> StoreError {
    StoreError::StorageFailed {
        reason: e.to_string(),
    }
}

const SELECT_WORKFLOW: &str = r#"
    SELECT id, tenant_id, name, trigger_kind, trigger_filter, steps, active, created_at, updated_at
    FROM workflows
"#;

/// Workflow store backed by the `workflows` table.
#[derive(Debug, Clone)]
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn list_active_workflows(&self) -> Result<Vec<WorkflowDefinition>, Report<StoreError>> {
        let rows: Vec<WorkflowRow> =
            sqlx::query_as(&format!("{SELECT_WORKFLOW} WHERE active ORDER BY created_at"))
                .fetch_all(&self.pool)
                .await
                .map_err(storage_failed)?;

        let workflows = rows
            .into_iter()
            .map(WorkflowRow::try_into_definition)
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_failed)?;
        Ok(workflows)
    }

    async fn get_workflow(
        &self,
        id: WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, Report<StoreError>> {
        let row: Option<WorkflowRow> = sqlx::query_as(&format!("{SELECT_WORKFLOW} WHERE id = $1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_failed)?;

        let workflow = row
            .map(WorkflowRow::try_into_definition)
            .transpose()
            .map_err(storage_failed)?;
        Ok(workflow)
    }

    async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), Report<StoreError>> {
        workflow.validate().map_err(StoreError::Invalid)?;

        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, tenant_id, name, trigger_kind, trigger_filter, steps, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                trigger_kind = EXCLUDED.trigger_kind,
                trigger_filter = EXCLUDED.trigger_filter,
                steps = EXCLUDED.steps,
                active = EXCLUDED.active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(workflow.tenant_id.to_string())
        .bind(&workflow.name)
        .bind(workflow.trigger.as_str())
        .bind(Json(&workflow.trigger_filter))
        .bind(Json(&workflow.steps))
        .bind(workflow.active)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_failed)?;
        Ok(())
    }

    async fn delete_workflow(&self, id: WorkflowId) -> Result<bool, Report<StoreError>> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_failed)?;
        Ok(result.rows_affected() > 0)
    }
}
