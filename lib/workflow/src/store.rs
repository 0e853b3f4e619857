//! The workflow store contract.
//!
//! Definitions are owned by the builder; the engine lists and reads them.
//! Saving validates first.

use crate::definition::WorkflowDefinition;
use crate::error::StoreError;
use async_trait::async_trait;
use nurture_core::WorkflowId;
use rootcause::Report;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Reads and writes workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Every workflow flagged active.
    async fn list_active_workflows(&self) -> Result<Vec<WorkflowDefinition>, Report<StoreError>>;

    /// One workflow by id, active or not.
    async fn get_workflow(
        &self,
        id: WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, Report<StoreError>>;

    /// Validates and upserts a workflow.
    async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), Report<StoreError>>;

    /// Removes a workflow. Returns whether it existed.
    async fn delete_workflow(&self, id: WorkflowId) -> Result<bool, Report<StoreError>>;
}

/// Store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<WorkflowId, WorkflowDefinition>>,
}

impl InMemoryWorkflowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `workflows` without validating them.
    #[must_use]
    pub fn with_workflows(workflows: impl IntoIterator<Item = WorkflowDefinition>) -> Self {
        Self {
            workflows: RwLock::new(workflows.into_iter().map(|wf| (wf.id, wf)).collect()),
        }
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn list_active_workflows(&self) -> Result<Vec<WorkflowDefinition>, Report<StoreError>> {
        let mut active: Vec<_> = self
            .workflows
            .read()
            .await
            .values()
            .filter(|wf| wf.active)
            .cloned()
            .collect();
        active.sort_by_key(|wf| wf.created_at);
        Ok(active)
    }

    async fn get_workflow(
        &self,
        id: WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, Report<StoreError>> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), Report<StoreError>> {
        workflow.validate().map_err(StoreError::Invalid)?;
        self.workflows
            .write()
            .await
            .insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn delete_workflow(&self, id: WorkflowId) -> Result<bool, Report<StoreError>> {
        Ok(self.workflows.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;
    use crate::trigger::TriggerKind;
    use nurture_core::TenantId;

    fn workflow(name: &str) -> WorkflowDefinition {
        WorkflowDefinition::new(TenantId::new(), name, TriggerKind::ContactCreated)
            .with_step(Step::log("new contact {{email}}"))
    }

    #[tokio::test]
    async fn lists_only_active() {
        let store = InMemoryWorkflowStore::new();
        let active = workflow("Active").activated();
        store.save_workflow(&active).await.expect("save");
        store.save_workflow(&workflow("Draft")).await.expect("save");

        let listed = store.list_active_workflows().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active.id);
    }

    #[tokio::test]
    async fn save_rejects_invalid_definitions() {
        let store = InMemoryWorkflowStore::new();
        let invalid = workflow("");
        let err = store.save_workflow(&invalid).await.expect_err("invalid");
        assert!(err.to_string().contains("workflow name is empty"));
        assert!(store.get_workflow(invalid.id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn save_overwrites_and_delete_removes() {
        let store = InMemoryWorkflowStore::new();
        let mut wf = workflow("Nurture");
        store.save_workflow(&wf).await.expect("save");

        wf.activate();
        store.save_workflow(&wf).await.expect("update");
        let stored = store.get_workflow(wf.id).await.expect("get").expect("exists");
        assert!(stored.active);

        assert!(store.delete_workflow(wf.id).await.expect("delete"));
        assert!(!store.delete_workflow(wf.id).await.expect("delete again"));
    }
}
