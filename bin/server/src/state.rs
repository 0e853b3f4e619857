//! Shared router state.

use nurture_workflow::{ExecutionLedger, TriggerDispatcher, WorkflowStore};
use std::sync::Arc;

/// Handles the routes need; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<TriggerDispatcher>,
    pub ledger: Arc<dyn ExecutionLedger>,
    pub store: Arc<dyn WorkflowStore>,
}

impl AppState {
    #[must_use]
    pub fn new(
        dispatcher: Arc<TriggerDispatcher>,
        ledger: Arc<dyn ExecutionLedger>,
        store: Arc<dyn WorkflowStore>,
    ) -> Self {
        Self {
            dispatcher,
            ledger,
            store,
        }
    }
}
