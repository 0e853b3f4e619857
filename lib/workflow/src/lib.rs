//! Workflow engine for nurture.
//!
//! This crate interprets marketing-automation workflows:
//!
//! - **Context**: the per-run variable bag seeded from the trigger payload
//! - **Steps**: typed step model (EMAIL, WAIT, LOG, CONDITION, AI_AGENT,
//!   SLACK, HTTP, SMS, WHATSAPP) and `{{var}}` templates
//! - **Handlers**: one per step kind, calling out through collaborator traits
//! - **Interpreter**: sequential execution with halt, timeout, retry and
//!   long-wait suspension
//! - **Ledger**: one persisted record per run
//! - **Dispatcher**: fans a trigger event out to matching active workflows

pub mod context;
pub mod deferred;
pub mod definition;
pub mod dispatcher;
pub mod error;
pub mod execution;
pub mod handler;
pub mod interpreter;
pub mod ledger;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod step;
pub mod store;
pub mod template;
pub mod trigger;

pub use context::VariableContext;
pub use deferred::{DeferredRun, DeferredRunQueue, InMemoryDeferredQueue};
pub use definition::WorkflowDefinition;
pub use dispatcher::{DispatchOutcome, DispatchSummary, TriggerDispatcher, WorkflowDispatchResult};
pub use error::{
    DeferredError, DispatchError, ExecutionError, LedgerError, StepError, StoreError,
    ValidationError,
};
pub use execution::{
    ExecutionRecord, ExecutionStatus, ParseStatusError, StepLogEntry, StepOutcome, StepStatus,
};
pub use handler::{Services, StepHandlers};
pub use interpreter::{Interpreter, InterpreterConfig, LongWaitMode, PendingRun, RunOutcome};
pub use ledger::{ExecutionLedger, InMemoryLedger};
pub use step::{ConditionOperator, RetryPolicy, Step, StepAction, StepKind};
pub use store::{InMemoryWorkflowStore, WorkflowStore};
pub use trigger::{TriggerFilter, TriggerKind, UnknownTriggerKind};
