//! Trigger dispatch.
//!
//! A trigger event fans out to every active workflow whose trigger matches.
//! Each match gets its own run and its own copy of the payload; a run that
//! fails to start is reported and does not affect the others.

use crate::context::VariableContext;
use crate::definition::WorkflowDefinition;
use crate::error::DispatchError;
use crate::execution::ExecutionStatus;
use crate::interpreter::{Interpreter, PendingRun};
use crate::store::WorkflowStore;
use crate::trigger::TriggerKind;
use futures::future::join_all;
use nurture_core::{ExecutionId, WorkflowId};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, instrument, warn};

/// What happened for one matching workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The run was created and handed to the runtime.
    Started { execution_id: ExecutionId },
    /// The run was created and executed to `status`.
    Finished {
        execution_id: ExecutionId,
        status: ExecutionStatus,
    },
    /// The run was created but stopped because its progress could not be
    /// persisted.
    Aborted {
        execution_id: ExecutionId,
        error: String,
    },
    /// The run could not be started; no record exists.
    Failed { error: String },
}

impl DispatchOutcome {
    /// Whether a ledger record was created for this workflow.
    #[must_use]
    pub fn started(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Per-workflow dispatch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDispatchResult {
    pub workflow_id: WorkflowId,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

/// Result of one trigger event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Runs whose ledger record was created.
    pub started_count: usize,
    pub results: Vec<WorkflowDispatchResult>,
}

impl DispatchSummary {
    fn from_results(results: Vec<WorkflowDispatchResult>) -> Self {
        Self {
            started_count: results.iter().filter(|r| r.outcome.started()).count(),
            results,
        }
    }
}

/// Routes trigger events to workflows.
#[derive(Clone)]
pub struct TriggerDispatcher {
    store: Arc<dyn WorkflowStore>,
    interpreter: Arc<Interpreter>,
}

impl std::fmt::Debug for TriggerDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerDispatcher")
            .field("interpreter", &self.interpreter)
            .finish_non_exhaustive()
    }
}

impl TriggerDispatcher {
    #[must_use]
    pub fn new(store: Arc<dyn WorkflowStore>, interpreter: Arc<Interpreter>) -> Self {
        Self { store, interpreter }
    }

    async fn matching(
        &self,
        kind: TriggerKind,
        payload: &VariableContext,
    ) -> Result<Vec<WorkflowDefinition>, Report<DispatchError>> {
        let workflows = self
            .store
            .list_active_workflows()
            .await
            .context(DispatchError::StoreUnavailable)?;
        let matching: Vec<_> = workflows
            .into_iter()
            .filter(|wf| wf.matches(kind, payload))
            .collect();
        info!(matched = matching.len(), "trigger matched workflows");
        Ok(matching)
    }

    /// Starts a run per matching workflow; returns the started runs and the
    /// failures in workflow order.
    async fn start_all(
        &self,
        workflows: Vec<WorkflowDefinition>,
        payload: &VariableContext,
    ) -> Vec<Result<PendingRun, WorkflowDispatchResult>> {
        let mut started = Vec::with_capacity(workflows.len());
        for workflow in workflows {
            let workflow_id = workflow.id;
            match self.interpreter.start(workflow, payload.clone()).await {
                Ok(run) => started.push(Ok(run)),
                Err(report) => {
                    warn!(workflow_id = %workflow_id, error = %report, "could not start workflow");
                    started.push(Err(WorkflowDispatchResult {
                        workflow_id,
                        outcome: DispatchOutcome::Failed {
                            error: report.to_string(),
                        },
                    }));
                }
            }
        }
        started
    }

    /// Starts every matching workflow and waits for all runs to end.
    ///
    /// Runs execute concurrently; steps within a run stay sequential.
    ///
    /// # Errors
    ///
    /// Returns an error only if the workflow store cannot be listed.
    #[instrument(skip(self, payload), fields(trigger = %kind))]
    pub async fn dispatch(
        &self,
        kind: TriggerKind,
        payload: VariableContext,
    ) -> Result<DispatchSummary, Report<DispatchError>> {
        let workflows = self.matching(kind, &payload).await?;
        let runs = self.start_all(workflows, &payload).await;

        let results = join_all(runs.into_iter().map(|run| async move {
            let run = match run {
                Ok(run) => run,
                Err(failed) => return failed,
            };
            let workflow_id = run.workflow.id;
            let execution_id = run.execution_id;
            let outcome = match self.interpreter.execute(run).await {
                Ok(outcome) => DispatchOutcome::Finished {
                    execution_id,
                    status: outcome.status,
                },
                Err(report) => {
                    error!(execution_id = %execution_id, error = %report, "execution aborted");
                    DispatchOutcome::Aborted {
                        execution_id,
                        error: report.to_string(),
                    }
                }
            };
            WorkflowDispatchResult {
                workflow_id,
                outcome,
            }
        }))
        .await;

        Ok(DispatchSummary::from_results(results))
    }

    /// Starts every matching workflow and spawns the runs.
    ///
    /// Ledger records exist when this returns; steps run in the background.
    ///
    /// # Errors
    ///
    /// Returns an error only if the workflow store cannot be listed.
    #[instrument(skip(self, payload), fields(trigger = %kind))]
    pub async fn dispatch_detached(
        &self,
        kind: TriggerKind,
        payload: VariableContext,
    ) -> Result<DispatchSummary, Report<DispatchError>> {
        let workflows = self.matching(kind, &payload).await?;
        let runs = self.start_all(workflows, &payload).await;

        let mut results = Vec::with_capacity(runs.len());
        for run in runs {
            let run = match run {
                Ok(run) => run,
                Err(failed) => {
                    results.push(failed);
                    continue;
                }
            };
            let workflow_id = run.workflow.id;
            let execution_id = run.execution_id;
            let interpreter = Arc::clone(&self.interpreter);
            let span = info_span!("detached_run", execution_id = %execution_id);
            tokio::spawn(
                async move {
                    if let Err(report) = interpreter.execute(run).await {
                        error!(error = %report, "execution aborted");
                    }
                }
                .instrument(span),
            );
            results.push(WorkflowDispatchResult {
                workflow_id,
                outcome: DispatchOutcome::Started { execution_id },
            });
        }

        Ok(DispatchSummary::from_results(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LedgerError, StoreError};
    use crate::execution::{ExecutionRecord, StepLogEntry};
    use crate::interpreter::InterpreterConfig;
    use crate::ledger::{ExecutionLedger, InMemoryLedger};
    use crate::mock::MockServices;
    use crate::step::{ConditionOperator, Step};
    use crate::store::InMemoryWorkflowStore;
    use crate::trigger::TriggerFilter;
    use async_trait::async_trait;
    use nurture_core::TenantId;
    use serde_json::{Value as JsonValue, json};
    use std::time::Duration;

    fn workflow(kind: TriggerKind, steps: Vec<Step>) -> WorkflowDefinition {
        let mut wf = WorkflowDefinition::new(TenantId::new(), "wf", kind).activated();
        wf.steps = steps;
        wf
    }

    fn payload() -> VariableContext {
        VariableContext::from_payload(json!({"name": "Ana", "email": "a@x.com", "source": "ads"}))
            .expect("object")
    }

    fn dispatcher(
        workflows: Vec<WorkflowDefinition>,
        ledger: Arc<dyn ExecutionLedger>,
    ) -> (TriggerDispatcher, MockServices) {
        let mocks = MockServices::new();
        let interpreter = Interpreter::new(mocks.services(), ledger, InterpreterConfig::default());
        let store = Arc::new(InMemoryWorkflowStore::with_workflows(workflows));
        (TriggerDispatcher::new(store, Arc::new(interpreter)), mocks)
    }

    #[tokio::test]
    async fn runs_every_matching_workflow() {
        let welcome = workflow(TriggerKind::FormSubmitted, vec![Step::email("Hi", "Welcome")]);
        let gated = workflow(
            TriggerKind::FormSubmitted,
            vec![Step::condition("source", ConditionOperator::Equals, "organic")],
        );
        let mut inactive = workflow(TriggerKind::FormSubmitted, vec![Step::log("x")]);
        inactive.deactivate();
        let other_kind = workflow(TriggerKind::ChatMessage, vec![Step::log("x")]);
        let filtered = workflow(TriggerKind::FormSubmitted, vec![Step::log("x")])
            .with_filter(TriggerFilter::any().require("form_id", "f9"));

        let ledger = Arc::new(InMemoryLedger::new());
        let (dispatcher, mocks) = dispatcher(
            vec![
                welcome.clone(),
                gated.clone(),
                inactive,
                other_kind,
                filtered,
            ],
            ledger.clone(),
        );

        let summary = dispatcher
            .dispatch(TriggerKind::FormSubmitted, payload())
            .await
            .expect("dispatch");

        assert_eq!(summary.started_count, 2);
        assert_eq!(summary.results.len(), 2);
        let status_of = |id: WorkflowId| {
            summary
                .results
                .iter()
                .find(|r| r.workflow_id == id)
                .map(|r| r.outcome.clone())
        };
        assert!(matches!(
            status_of(welcome.id),
            Some(DispatchOutcome::Finished {
                status: ExecutionStatus::Success,
                ..
            })
        ));
        assert!(matches!(
            status_of(gated.id),
            Some(DispatchOutcome::Finished {
                status: ExecutionStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(mocks.mail.sent().await.len(), 1);
        assert_eq!(ledger.records().await.len(), 2);
    }

    #[tokio::test]
    async fn no_match_starts_nothing() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (dispatcher, _) = dispatcher(
            vec![workflow(TriggerKind::Webhook, vec![Step::log("x")])],
            ledger.clone(),
        );
        let summary = dispatcher
            .dispatch(TriggerKind::Manual, payload())
            .await
            .expect("dispatch");
        assert_eq!(summary, DispatchSummary::default());
        assert!(ledger.records().await.is_empty());
    }

    /// Fails to create records for one workflow.
    struct RefusingLedger {
        inner: InMemoryLedger,
        refuse: WorkflowId,
        refuse_progress: bool,
    }

    #[async_trait]
    impl ExecutionLedger for RefusingLedger {
        async fn create(
            &self,
            workflow_id: WorkflowId,
            input: &JsonValue,
        ) -> Result<ExecutionId, Report<LedgerError>> {
            if workflow_id == self.refuse {
                return Err(LedgerError::StorageFailed {
                    reason: "disk full".to_string(),
                }
                .into());
            }
            self.inner.create(workflow_id, input).await
        }

        async fn append_progress(
            &self,
            id: ExecutionId,
            log: &[StepLogEntry],
        ) -> Result<(), Report<LedgerError>> {
            if self.refuse_progress {
                return Err(LedgerError::StorageFailed {
                    reason: "connection reset".to_string(),
                }
                .into());
            }
            self.inner.append_progress(id, log).await
        }

        async fn suspend(
            &self,
            id: ExecutionId,
            log: &[StepLogEntry],
        ) -> Result<(), Report<LedgerError>> {
            self.inner.suspend(id, log).await
        }

        async fn finalize(
            &self,
            id: ExecutionId,
            status: ExecutionStatus,
            log: &[StepLogEntry],
        ) -> Result<(), Report<LedgerError>> {
            self.inner.finalize(id, status, log).await
        }

        async fn get(
            &self,
            id: ExecutionId,
        ) -> Result<Option<ExecutionRecord>, Report<LedgerError>> {
            self.inner.get(id).await
        }
    }

    #[tokio::test]
    async fn start_failure_is_reported_per_workflow() {
        let broken = workflow(TriggerKind::ContactCreated, vec![Step::log("x")]);
        let healthy = workflow(TriggerKind::ContactCreated, vec![Step::log("y")]);
        let ledger = Arc::new(RefusingLedger {
            inner: InMemoryLedger::new(),
            refuse: broken.id,
            refuse_progress: false,
        });
        let (dispatcher, _) = dispatcher(vec![broken.clone(), healthy.clone()], ledger);

        let summary = dispatcher
            .dispatch(TriggerKind::ContactCreated, payload())
            .await
            .expect("dispatch");
        assert_eq!(summary.started_count, 1);

        let broken_result = summary
            .results
            .iter()
            .find(|r| r.workflow_id == broken.id)
            .expect("broken reported");
        assert!(matches!(broken_result.outcome, DispatchOutcome::Failed { .. }));
        assert!(
            summary
                .results
                .iter()
                .any(|r| r.workflow_id == healthy.id && r.outcome.started())
        );
    }

    #[tokio::test]
    async fn run_that_cannot_persist_still_counts_as_started() {
        let wf = workflow(TriggerKind::Webhook, vec![Step::log("x")]);
        let ledger = Arc::new(RefusingLedger {
            inner: InMemoryLedger::new(),
            refuse: WorkflowId::new(),
            refuse_progress: true,
        });
        let (dispatcher, _) = dispatcher(vec![wf.clone()], ledger.clone());

        let summary = dispatcher
            .dispatch(TriggerKind::Webhook, payload())
            .await
            .expect("dispatch");
        assert_eq!(summary.started_count, 1);
        assert_eq!(ledger.inner.records().await.len(), 1);

        let DispatchOutcome::Aborted {
            execution_id,
            ref error,
        } = summary.results[0].outcome
        else {
            panic!("expected aborted outcome");
        };
        assert!(error.contains("could not persist"));
        assert!(ledger.get(execution_id).await.expect("get").is_some());

        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["results"][0]["outcome"], "aborted");
    }

    #[tokio::test]
    async fn detached_dispatch_creates_records_before_returning() {
        let ledger = Arc::new(InMemoryLedger::new());
        let wf = workflow(TriggerKind::Manual, vec![Step::log("hello {{name}}")]);
        let (dispatcher, _) = dispatcher(vec![wf.clone()], ledger.clone());

        let summary = dispatcher
            .dispatch_detached(TriggerKind::Manual, payload())
            .await
            .expect("dispatch");
        assert_eq!(summary.started_count, 1);
        let DispatchOutcome::Started { execution_id } = summary.results[0].outcome else {
            panic!("expected started outcome");
        };
        assert!(ledger.get(execution_id).await.expect("get").is_some());

        let mut status = ExecutionStatus::Pending;
        for _ in 0..50 {
            if let Some(record) = ledger.get(execution_id).await.expect("get") {
                status = record.status;
                if status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, ExecutionStatus::Success);
    }

    #[test]
    fn summary_wire_format() {
        let summary = DispatchSummary::from_results(vec![WorkflowDispatchResult {
            workflow_id: WorkflowId::new(),
            outcome: DispatchOutcome::Failed {
                error: "boom".to_string(),
            },
        }]);
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["started_count"], 0);
        assert_eq!(json["results"][0]["outcome"], "failed");
        assert_eq!(json["results"][0]["error"], "boom");
    }

    struct DownStore;

    #[async_trait]
    impl WorkflowStore for DownStore {
        async fn list_active_workflows(
            &self,
        ) -> Result<Vec<WorkflowDefinition>, Report<StoreError>> {
            Err(StoreError::StorageFailed {
                reason: "connection refused".to_string(),
            }
            .into())
        }

        async fn get_workflow(
            &self,
            _id: WorkflowId,
        ) -> Result<Option<WorkflowDefinition>, Report<StoreError>> {
            Ok(None)
        }

        async fn save_workflow(
            &self,
            _workflow: &WorkflowDefinition,
        ) -> Result<(), Report<StoreError>> {
            Ok(())
        }

        async fn delete_workflow(&self, _id: WorkflowId) -> Result<bool, Report<StoreError>> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn store_failure_is_an_error() {
        let interpreter = Interpreter::new(
            MockServices::new().services(),
            Arc::new(InMemoryLedger::new()),
            InterpreterConfig::default(),
        );
        let dispatcher = TriggerDispatcher::new(Arc::new(DownStore), Arc::new(interpreter));
        let err = dispatcher
            .dispatch(TriggerKind::Webhook, payload())
            .await
            .expect_err("store down");
        assert!(err.to_string().contains("could not list active workflows"));
    }
}
