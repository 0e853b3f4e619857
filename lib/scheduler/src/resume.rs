//! The resume scheduler.
//!
//! Ticks at a fixed interval. Each tick takes every due run from the deferred
//! queue, loads its workflow and resumes it at the saved step. A run whose
//! workflow was deleted meanwhile is finalized `FAILED`.

use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use nurture_workflow::{
    DeferredRun, DeferredRunQueue, ExecutionStatus, Interpreter, StepKind, WorkflowStore,
};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

/// Counts from one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Runs handed back to the interpreter.
    pub resumed: usize,
    /// Runs finalized because their workflow is gone.
    pub aborted: usize,
    /// Runs put back on the queue after the store failed.
    pub requeued: usize,
    /// Runs that could not be resumed or finalized.
    pub failed: usize,
}

/// Resumes suspended runs when their wait is over.
pub struct ResumeScheduler {
    queue: Arc<dyn DeferredRunQueue>,
    store: Arc<dyn WorkflowStore>,
    interpreter: Arc<Interpreter>,
    interval: Duration,
}

impl std::fmt::Debug for ResumeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeScheduler")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl ResumeScheduler {
    #[must_use]
    pub fn new(
        queue: Arc<dyn DeferredRunQueue>,
        store: Arc<dyn WorkflowStore>,
        interpreter: Arc<Interpreter>,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            interpreter,
            interval,
        }
    }

    /// Resumes every run due at `now`.
    ///
    /// Individual runs that cannot be resumed are logged and counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    #[instrument(skip(self))]
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, Report<SchedulerError>> {
        let due = self
            .queue
            .take_due(now)
            .await
            .context(SchedulerError::QueueUnavailable)?;
        let mut report = TickReport::default();
        if due.is_empty() {
            return Ok(report);
        }
        debug!(due = due.len(), "resuming due runs");

        for run in due {
            let execution_id = run.execution_id;
            match self.resume_one(run).await {
                Ok(Resumed::Continued(status)) => {
                    debug!(execution_id = %execution_id, status = %status, "run resumed");
                    report.resumed += 1;
                }
                Ok(Resumed::Aborted) => report.aborted += 1,
                Ok(Resumed::Requeued) => report.requeued += 1,
                Err(err) => {
                    error!(execution_id = %execution_id, error = %err, "could not resume run");
                    report.failed += 1;
                }
            }
        }

        info!(
            resumed = report.resumed,
            aborted = report.aborted,
            requeued = report.requeued,
            failed = report.failed,
            "resume tick finished"
        );
        Ok(report)
    }

    async fn resume_one(&self, run: DeferredRun) -> Result<Resumed, Report<SchedulerError>> {
        let execution_id = run.execution_id;
        let workflow_id = run.workflow_id;

        let workflow = match self.store.get_workflow(workflow_id).await {
            Ok(workflow) => workflow,
            Err(err) => {
                warn!(workflow_id = %workflow_id, error = %err, "store unavailable, requeueing run");
                self.queue
                    .enqueue(run)
                    .await
                    .context(SchedulerError::LoadWorkflow { workflow_id })?;
                return Ok(Resumed::Requeued);
            }
        };

        let Some(workflow) = workflow else {
            warn!(workflow_id = %workflow_id, "workflow of deferred run no longer exists");
            self.interpreter
                .abort(
                    execution_id,
                    run.next_step.saturating_sub(1),
                    StepKind::Wait,
                    format!("workflow {workflow_id} no longer exists"),
                )
                .await
                .context(SchedulerError::Resume { execution_id })?;
            return Ok(Resumed::Aborted);
        };

        let outcome = self
            .interpreter
            .resume(&workflow, run)
            .await
            .context(SchedulerError::Resume { execution_id })?;
        Ok(Resumed::Continued(outcome.status))
    }

    /// Ticks until `shutdown` completes.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_ms = self.interval.as_millis(), "resume scheduler started");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.tick(Utc::now()).await {
                        error!(error = %err, "resume tick failed");
                    }
                }
            }
        }
        info!("resume scheduler stopped");
    }
}

enum Resumed {
    Continued(ExecutionStatus),
    Aborted,
    Requeued,
}
