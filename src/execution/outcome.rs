//! Run Outcomes and Log Records
//!
//! The structured records the engine emits per step, the sink they are
//! emitted to, and the terminal [`RunOutcome`] of a workflow run.

use log::{info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::error::StepError;
use crate::monitoring::ExecutionTimeline;
use crate::workflow::context::Context;

/// Status of a single log record.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    Error,
}

/// Structured record of one executed step.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub step: String,
    pub status: RecordStatus,

    /// Result value (success records only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Failure detail (error records only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,

    /// Error of the primary operation when the step's fallback ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_error: Option<StepError>,
}

impl LogRecord {
    pub fn success(step: impl Into<String>, payload: Value) -> Self {
        Self {
            step: step.into(),
            status: RecordStatus::Success,
            payload: Some(payload),
            error: None,
            primary_error: None,
        }
    }

    pub fn failure(step: impl Into<String>, error: StepError) -> Self {
        Self {
            step: step.into(),
            status: RecordStatus::Error,
            payload: None,
            error: Some(error),
            primary_error: None,
        }
    }

    pub fn with_primary_error(mut self, error: Option<StepError>) -> Self {
        self.primary_error = error;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }
}

/// Receives log records as the engine produces them.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord);
}

/// Default sink: forwards records to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeSink;

impl LogSink for LogFacadeSink {
    fn emit(&self, record: &LogRecord) {
        match (&record.payload, &record.error) {
            (Some(payload), _) => {
                if let Some(primary) = &record.primary_error {
                    warn!("[{}] primary failed, fallback used: {}", record.step, primary);
                }
                info!("[{}] ok: {}", record.step, payload);
            }
            (None, Some(error)) => warn!("[{}] error: {}", record.step, error),
            (None, None) => info!("[{}] {:?}", record.step, record.status),
        }
    }
}

/// Terminal status of a workflow run.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step was attempted
    Completed,
    /// A required step failed or a gate did not hold
    Halted,
    /// The caller cancelled the run between steps
    Cancelled,
}

/// Terminal record of a workflow execution.
#[derive(Serialize, Debug, Clone)]
pub struct RunOutcome {
    pub workflow: String,
    pub status: RunStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub halt_cause: Option<StepError>,

    pub context: Context,
    pub log: Vec<LogRecord>,

    #[serde(skip)]
    pub timeline: ExecutionTimeline,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn is_halted(&self) -> bool {
        self.status == RunStatus::Halted
    }

    /// Names of steps that recorded an error, in run order.
    pub fn failed_steps(&self) -> Vec<&str> {
        self.log
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.step.as_str())
            .collect()
    }

    /// True when the run completed and every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.is_completed() && self.log.iter().all(LogRecord::is_success)
    }
}
