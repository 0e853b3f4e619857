//! The step interpreter.
//!
//! Runs a workflow's steps in array order against one variable context:
//!
//! 1. Create the ledger record (`PENDING`) before any step runs
//! 2. Execute each step through its handler, under a timeout and the step's
//!    retry policy
//! 3. Append a log entry and persist the log after every step
//! 4. Stop on a `FALSE` condition (`CANCELLED`) or a fatal error (`FAILED`)
//! 5. Finalize once, `SUCCESS` if nothing stopped the run
//!
//! In suspend mode a long WAIT parks the run in the deferred queue and marks
//! the record `WAITING`; [`Interpreter::resume`] picks it up again.

use crate::context::VariableContext;
use crate::deferred::{DeferredRun, DeferredRunQueue};
use crate::definition::WorkflowDefinition;
use crate::error::{ExecutionError, StepError};
use crate::execution::{ExecutionStatus, StepLogEntry, StepOutcome, StepStatus};
use crate::handler::{Services, StepHandlers};
use crate::ledger::ExecutionLedger;
use crate::step::{RetryPolicy, Step, StepKind};
use chrono::{DateTime, TimeDelta, Utc};
use futures::FutureExt;
use nurture_core::ExecutionId;
use rootcause::Report;
use rootcause::prelude::ResultExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Default threshold below which a WAIT blocks in place.
pub const DEFAULT_WAIT_THRESHOLD: Duration = Duration::from_secs(10);
/// Default per-step timeout.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// What happens at a WAIT at or above the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongWaitMode {
    /// Log `QUEUED` and go on with the next step.
    #[default]
    Continue,
    /// Park the run in the deferred queue until the wait is over.
    Suspend,
}

/// Interpreter tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub wait_threshold: Duration,
    /// Applies to every step except WAIT unless the step overrides it.
    pub step_timeout: Duration,
    pub long_wait: LongWaitMode,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            wait_threshold: DEFAULT_WAIT_THRESHOLD,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            long_wait: LongWaitMode::Continue,
        }
    }
}

/// A run whose ledger record exists but whose steps have not started.
#[derive(Debug, Clone)]
pub struct PendingRun {
    pub execution_id: ExecutionId,
    pub workflow: WorkflowDefinition,
    pub context: VariableContext,
}

/// How a run ended, or `WAITING` if it was parked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    pub log: Vec<StepLogEntry>,
}

/// Interprets workflows.
pub struct Interpreter {
    handlers: StepHandlers,
    ledger: Arc<dyn ExecutionLedger>,
    deferred: Option<Arc<dyn DeferredRunQueue>>,
    config: InterpreterConfig,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("config", &self.config)
            .field("deferred", &self.deferred.is_some())
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    #[must_use]
    pub fn new(
        services: Services,
        ledger: Arc<dyn ExecutionLedger>,
        config: InterpreterConfig,
    ) -> Self {
        Self {
            handlers: StepHandlers::new(services, config.wait_threshold),
            ledger,
            deferred: None,
            config,
        }
    }

    /// Sets the queue used in suspend mode.
    #[must_use]
    pub fn with_deferred_queue(mut self, queue: Arc<dyn DeferredRunQueue>) -> Self {
        self.deferred = Some(queue);
        self
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn ExecutionLedger> {
        &self.ledger
    }

    #[must_use]
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Creates the ledger record for a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be created; no step runs then.
    #[instrument(skip_all, fields(workflow_id = %workflow.id))]
    pub async fn start(
        &self,
        workflow: WorkflowDefinition,
        context: VariableContext,
    ) -> Result<PendingRun, Report<ExecutionError>> {
        let execution_id = self
            .ledger
            .create(workflow.id, &context.to_json())
            .await
            .context(ExecutionError::Start {
                workflow_id: workflow.id,
            })?;
        debug!(execution_id = %execution_id, "execution created");
        Ok(PendingRun {
            execution_id,
            workflow,
            context,
        })
    }

    /// Runs a started execution to its end.
    ///
    /// # Errors
    ///
    /// Returns an error if progress cannot be persisted.
    pub async fn execute(&self, run: PendingRun) -> Result<RunOutcome, Report<ExecutionError>> {
        let PendingRun {
            execution_id,
            workflow,
            mut context,
        } = run;
        self.drive(execution_id, &workflow, 0, &mut context, Vec::new())
            .await
    }

    /// Starts and runs an execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be created or updated.
    pub async fn run(
        &self,
        workflow: WorkflowDefinition,
        context: VariableContext,
    ) -> Result<RunOutcome, Report<ExecutionError>> {
        let pending = self.start(workflow, context).await?;
        self.execute(pending).await
    }

    /// Continues a deferred run from its saved step index.
    ///
    /// # Errors
    ///
    /// Returns an error if progress cannot be persisted.
    pub async fn resume(
        &self,
        workflow: &WorkflowDefinition,
        deferred: DeferredRun,
    ) -> Result<RunOutcome, Report<ExecutionError>> {
        let DeferredRun {
            execution_id,
            next_step,
            mut context,
            log,
            ..
        } = deferred;
        info!(execution_id = %execution_id, next_step, "resuming deferred execution");
        self.drive(execution_id, workflow, next_step, &mut context, log)
            .await
    }

    /// Finalizes a run that cannot continue, with a single diagnostic entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be finalized.
    pub async fn abort(
        &self,
        execution_id: ExecutionId,
        index: usize,
        kind: StepKind,
        reason: impl Into<String>,
    ) -> Result<RunOutcome, Report<ExecutionError>> {
        let entry = StepLogEntry::new(index, kind, StepOutcome::failed(reason));
        self.finish(execution_id, ExecutionStatus::Failed, vec![entry])
            .await
    }

    #[instrument(skip_all, fields(execution_id = %execution_id, workflow_id = %workflow.id, next_step = start))]
    async fn drive(
        &self,
        execution_id: ExecutionId,
        workflow: &WorkflowDefinition,
        start: usize,
        ctx: &mut VariableContext,
        mut log: Vec<StepLogEntry>,
    ) -> Result<RunOutcome, Report<ExecutionError>> {
        let total = workflow.steps.len();
        for (index, step) in workflow.steps.iter().enumerate().skip(start) {
            let kind = step.kind();
            let outcome = match self.attempt(step, ctx).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(step_index = index, kind = %kind, error = %err, "fatal step error");
                    return self
                        .abort(execution_id, index, kind, err.to_string())
                        .await;
                }
            };
            debug!(step_index = index, kind = %kind, status = ?outcome.status, "step finished");

            let halts = outcome.halts();
            let long_wait = kind == StepKind::Wait && outcome.status == StepStatus::Queued;
            log.push(StepLogEntry::new(index, kind, outcome));

            if halts {
                return self
                    .finish(execution_id, ExecutionStatus::Cancelled, log)
                    .await;
            }

            self.ledger
                .append_progress(execution_id, &log)
                .await
                .context(ExecutionError::Persist { execution_id })?;

            if long_wait && index + 1 < total {
                if let Some(queue) = self.suspend_queue() {
                    let run = DeferredRun {
                        execution_id,
                        workflow_id: workflow.id,
                        next_step: index + 1,
                        context: ctx.clone(),
                        log,
                        due_at: resume_at(Utc::now(), step),
                    };
                    return self.defer(queue, run).await;
                }
            }
        }

        self.finish(execution_id, ExecutionStatus::Success, log)
            .await
    }

    fn suspend_queue(&self) -> Option<&Arc<dyn DeferredRunQueue>> {
        if self.config.long_wait != LongWaitMode::Suspend {
            return None;
        }
        if self.deferred.is_none() {
            warn!("suspend mode without a deferred queue, continuing past long wait");
        }
        self.deferred.as_ref()
    }

    async fn defer(
        &self,
        queue: &Arc<dyn DeferredRunQueue>,
        run: DeferredRun,
    ) -> Result<RunOutcome, Report<ExecutionError>> {
        let execution_id = run.execution_id;
        let log = run.log.clone();
        let due_at = run.due_at;
        queue
            .enqueue(run)
            .await
            .context(ExecutionError::Defer { execution_id })?;
        self.ledger
            .suspend(execution_id, &log)
            .await
            .context(ExecutionError::Persist { execution_id })?;
        info!(due_at = %due_at, "execution suspended until wait is over");
        Ok(RunOutcome {
            execution_id,
            status: ExecutionStatus::Waiting,
            log,
        })
    }

    async fn finish(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        log: Vec<StepLogEntry>,
    ) -> Result<RunOutcome, Report<ExecutionError>> {
        self.ledger
            .finalize(execution_id, status, &log)
            .await
            .context(ExecutionError::Persist { execution_id })?;
        info!(execution_id = %execution_id, status = %status, steps = log.len(), "execution finished");
        Ok(RunOutcome {
            execution_id,
            status,
            log,
        })
    }

    /// Runs a step under its retry policy. Only `FAILED` outcomes are retried.
    async fn attempt(
        &self,
        step: &Step,
        ctx: &mut VariableContext,
    ) -> Result<StepOutcome, StepError> {
        let policy = step.retry.unwrap_or(RetryPolicy::once());
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let mut outcome = self.attempt_once(step, ctx).await?;
            if outcome.status != StepStatus::Failed || attempt >= max_attempts {
                if attempt > 1 {
                    outcome.detail = format!("{} (attempt {attempt} of {max_attempts})", outcome.detail);
                }
                return Ok(outcome);
            }
            debug!(attempt, max_attempts, detail = %outcome.detail, "step failed, retrying");
            tokio::time::sleep(Duration::from_millis(policy.backoff_ms)).await;
            attempt += 1;
        }
    }

    async fn attempt_once(
        &self,
        step: &Step,
        ctx: &mut VariableContext,
    ) -> Result<StepOutcome, StepError> {
        let kind = step.kind();
        let guarded = AssertUnwindSafe(self.handlers.execute(step, ctx)).catch_unwind();

        let result = if kind == StepKind::Wait {
            guarded.await
        } else {
            let limit = step
                .timeout_secs
                .map_or(self.config.step_timeout, Duration::from_secs);
            match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(kind = %kind, limit_secs = limit.as_secs(), "step timed out");
                    return Ok(StepOutcome::failed(format!(
                        "timed out after {}s",
                        limit.as_secs()
                    )));
                }
            }
        };

        result.unwrap_or_else(|payload| {
            Err(StepError::Panicked {
                kind,
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

/// When a deferred WAIT is due. Delays past the representable range park
/// the run at the latest representable instant.
fn resume_at(now: DateTime<Utc>, step: &Step) -> DateTime<Utc> {
    i64::try_from(step.delay.unwrap_or(0))
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|wait| now.checked_add_signed(wait))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
