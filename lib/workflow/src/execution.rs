//! Execution records.
//!
//! One [`ExecutionRecord`] exists per run. It is created `PENDING` before the
//! first step runs, its log grows after every step, and it is finalized
//! exactly once. A terminal record is never written again.

use crate::error::LedgerError;
use crate::step::StepKind;
use chrono::{DateTime, Utc};
use nurture_core::{ExecutionId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// The status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Created; steps are running.
    Pending,
    /// Suspended on a long wait, to be resumed.
    Waiting,
    /// Every attempted step ran without a halt or fatal error.
    Success,
    /// A condition evaluated false.
    Cancelled,
    /// A fatal error ended the run.
    Failed,
}

impl ExecutionStatus {
    /// Returns true if the record can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Cancelled | Self::Failed)
    }

    /// Returns the status as stored.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Waiting => "WAITING",
            Self::Success => "SUCCESS",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown execution status: {}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for ExecutionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "WAITING" => Ok(Self::Waiting),
            "SUCCESS" => Ok(Self::Success),
            "CANCELLED" => Ok(Self::Cancelled),
            "FAILED" => Ok(Self::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// The status a handler reports for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
    /// Condition held.
    True,
    /// Condition did not hold; the run halts.
    False,
    /// Long wait acknowledged without blocking.
    Queued,
}

/// What a handler reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub status: StepStatus,
    /// Human-readable detail for the log.
    pub detail: String,
}

impl StepOutcome {
    fn with(status: StepStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn success(detail: impl Into<String>) -> Self {
        Self::with(StepStatus::Success, detail)
    }

    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::with(StepStatus::Failed, detail)
    }

    #[must_use]
    pub fn skipped(detail: impl Into<String>) -> Self {
        Self::with(StepStatus::Skipped, detail)
    }

    #[must_use]
    pub fn queued(detail: impl Into<String>) -> Self {
        Self::with(StepStatus::Queued, detail)
    }

    /// `TRUE` or `FALSE` depending on `held`.
    #[must_use]
    pub fn condition(held: bool, detail: impl Into<String>) -> Self {
        let status = if held {
            StepStatus::True
        } else {
            StepStatus::False
        };
        Self::with(status, detail)
    }

    /// Whether this outcome stops the run.
    #[must_use]
    pub fn halts(&self) -> bool {
        self.status == StepStatus::False
    }
}

/// One line of an execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLogEntry {
    /// Position of the step in the workflow.
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub timestamp: DateTime<Utc>,
    pub status: StepStatus,
    pub detail: String,
}

impl StepLogEntry {
    /// Creates an entry stamped now.
    #[must_use]
    pub fn new(index: usize, kind: StepKind, outcome: StepOutcome) -> Self {
        Self {
            index,
            kind,
            timestamp: Utc::now(),
            status: outcome.status,
            detail: outcome.detail,
        }
    }
}

/// The persisted record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    /// Snapshot of the trigger payload.
    pub input: JsonValue,
    pub log: Vec<StepLogEntry>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Creates a `PENDING` record with an empty log.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, input: JsonValue) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            status: ExecutionStatus::Pending,
            input,
            log: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn ensure_writable(&self) -> Result<(), LedgerError> {
        if self.status.is_terminal() {
            return Err(LedgerError::AlreadyTerminal {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Replaces the log with the latest progress. A waiting run becomes
    /// pending again.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyTerminal` if the record is finished.
    pub fn record_progress(&mut self, log: Vec<StepLogEntry>) -> Result<(), LedgerError> {
        self.ensure_writable()?;
        self.status = ExecutionStatus::Pending;
        self.log = log;
        Ok(())
    }

    /// Marks the run as waiting on a deferred resume.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyTerminal` if the record is finished.
    pub fn suspend(&mut self, log: Vec<StepLogEntry>) -> Result<(), LedgerError> {
        self.ensure_writable()?;
        self.status = ExecutionStatus::Waiting;
        self.log = log;
        Ok(())
    }

    /// Writes the terminal status and final log.
    ///
    /// # Errors
    ///
    /// Returns `NonTerminalStatus` for a non-terminal `status` and
    /// `AlreadyTerminal` if the record is finished.
    pub fn finalize(
        &mut self,
        status: ExecutionStatus,
        log: Vec<StepLogEntry>,
    ) -> Result<(), LedgerError> {
        if !status.is_terminal() {
            return Err(LedgerError::NonTerminalStatus { status });
        }
        self.ensure_writable()?;
        self.status = status;
        self.log = log;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, status: StepStatus) -> StepLogEntry {
        StepLogEntry::new(
            index,
            StepKind::Log,
            StepOutcome {
                status,
                detail: String::new(),
            },
        )
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Waiting.is_terminal());
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
    }

    #[test]
    fn status_parses_what_it_prints() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Waiting,
            ExecutionStatus::Success,
            ExecutionStatus::Cancelled,
            ExecutionStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<ExecutionStatus>(), Ok(status));
        }
        assert!("RUNNING".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn only_false_halts() {
        assert!(StepOutcome::condition(false, "").halts());
        assert!(!StepOutcome::condition(true, "").halts());
        assert!(!StepOutcome::failed("boom").halts());
        assert!(!StepOutcome::queued("later").halts());
    }

    #[test]
    fn record_lifecycle() {
        let mut record = ExecutionRecord::new(WorkflowId::new(), serde_json::json!({"name": "Ana"}));
        assert_eq!(record.status, ExecutionStatus::Pending);
        assert!(record.log.is_empty());

        record
            .record_progress(vec![entry(0, StepStatus::Success)])
            .expect("progress");
        record
            .suspend(vec![entry(0, StepStatus::Success), entry(1, StepStatus::Queued)])
            .expect("suspend");
        assert_eq!(record.status, ExecutionStatus::Waiting);

        record
            .record_progress(vec![entry(0, StepStatus::Success)])
            .expect("resume progress");
        assert_eq!(record.status, ExecutionStatus::Pending);

        record
            .finalize(ExecutionStatus::Success, vec![entry(0, StepStatus::Success)])
            .expect("finalize");
        assert_eq!(record.status, ExecutionStatus::Success);
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn terminal_record_is_frozen() {
        let mut record = ExecutionRecord::new(WorkflowId::new(), serde_json::json!({}));
        record
            .finalize(ExecutionStatus::Cancelled, Vec::new())
            .expect("finalize");

        let err = record
            .record_progress(vec![entry(0, StepStatus::Success)])
            .expect_err("terminal");
        assert!(matches!(err, LedgerError::AlreadyTerminal { .. }));
        assert!(record.log.is_empty());

        let err = record
            .finalize(ExecutionStatus::Success, Vec::new())
            .expect_err("terminal");
        assert!(matches!(err, LedgerError::AlreadyTerminal { .. }));
        assert_eq!(record.status, ExecutionStatus::Cancelled);
    }

    #[test]
    fn finalize_requires_terminal_status() {
        let mut record = ExecutionRecord::new(WorkflowId::new(), serde_json::json!({}));
        let err = record
            .finalize(ExecutionStatus::Waiting, Vec::new())
            .expect_err("non-terminal");
        assert_eq!(
            err,
            LedgerError::NonTerminalStatus {
                status: ExecutionStatus::Waiting
            }
        );
    }

    #[test]
    fn log_entry_wire_format() {
        let json = serde_json::to_value(entry(2, StepStatus::Queued)).expect("serialize");
        assert_eq!(json["index"], 2);
        assert_eq!(json["type"], "LOG");
        assert_eq!(json["status"], "QUEUED");
    }
}
