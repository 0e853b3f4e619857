//! Workflow definitions.
//!
//! A workflow is a named automation owned by a tenant:
//! - a trigger kind and an optional payload filter
//! - an ordered list of steps
//! - an active flag
//!
//! Definitions are produced by the builder and read-only to the engine.

use crate::context::VariableContext;
use crate::error::ValidationError;
use crate::step::Step;
use crate::trigger::{TriggerFilter, TriggerKind};
use chrono::{DateTime, Utc};
use nurture_core::{TenantId, WorkflowId};
use serde::{Deserialize, Serialize};

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub tenant_id: TenantId,
    pub name: String,
    /// The event that starts this workflow.
    pub trigger: TriggerKind,
    #[serde(default, skip_serializing_if = "TriggerFilter::is_empty")]
    pub trigger_filter: TriggerFilter,
    /// Steps, executed in array order.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Inactive workflows are never dispatched.
    #[serde(default)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Creates an inactive workflow with no steps.
    #[must_use]
    pub fn new(tenant_id: TenantId, name: impl Into<String>, trigger: TriggerKind) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            tenant_id,
            name: name.into(),
            trigger,
            trigger_filter: TriggerFilter::any(),
            steps: Vec::new(),
            active: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Replaces the trigger filter.
    #[must_use]
    pub fn with_filter(mut self, filter: TriggerFilter) -> Self {
        self.trigger_filter = filter;
        self
    }

    /// Marks the workflow active.
    #[must_use]
    pub fn activated(mut self) -> Self {
        self.activate();
        self
    }

    pub fn activate(&mut self) {
        self.active = true;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }

    /// Whether a trigger event should start this workflow.
    ///
    /// Requires the workflow to be active, the kind to be equal and every
    /// filter entry to be present in the payload.
    #[must_use]
    pub fn matches(&self, kind: TriggerKind, payload: &VariableContext) -> bool {
        self.active && self.trigger == kind && self.trigger_filter.matches(payload)
    }

    /// Checks the definition before it is saved.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        self.steps
            .iter()
            .enumerate()
            .try_for_each(|(index, step)| step.validate(index))
    }
}
