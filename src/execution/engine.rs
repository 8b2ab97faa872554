//! Workflow Execution Engine
//!
//! Runs a workflow's steps strictly in order against a fresh context:
//! - One step at a time; each operation is awaited before the next starts
//! - Output bindings committed to the context before the gate is evaluated
//! - Every step produces exactly one structured log record
//! - Cancellation checked between steps

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};

use super::outcome::{LogFacadeSink, LogSink, RunOutcome, RunStatus};
use super::step::execute_step;
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::workflow::context::Context;
use crate::workflow::model::Workflow;

/// Workflow execution engine.
///
/// The engine holds no per-run state; the same engine can run any number of
/// workflows, each with its own context.
///
/// # Example
///
/// ```rust
/// use cdnflow::execution::operation::ConstOperation;
/// use cdnflow::execution::{Engine, RunStatus};
/// use cdnflow::workflow::{Binding, Context, Step, Workflow};
/// use serde_json::json;
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let workflow = Workflow::from_steps(
///     "demo",
///     vec![Step::new("create", ConstOperation::new(json!({"id": "svc1"})))
///         .with_binding(Binding::new("service_id", "id"))],
/// )
/// .unwrap();
///
/// let outcome = runtime.block_on(Engine::new().run(&workflow, Context::new()));
/// assert_eq!(outcome.status, RunStatus::Completed);
/// assert_eq!(outcome.context.get("service_id"), Some(&json!("svc1")));
/// ```
pub struct Engine {
    sink: Box<dyn LogSink>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl Engine {
    /// Creates an engine that logs through the `log` facade.
    pub fn new() -> Self {
        Self {
            sink: Box::new(LogFacadeSink),
            cancel_flag: None,
        }
    }

    /// Replaces the sink that receives log records.
    pub fn set_sink(&mut self, sink: impl LogSink + 'static) {
        self.sink = Box::new(sink);
    }

    /// Sets a flag that cancels the run before the next step when raised.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel_flag = Some(flag);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Executes the workflow starting from `initial`.
    ///
    /// Never fails: per-step failures are recorded in the outcome's log and
    /// the terminal state is reported through [`RunOutcome::status`].
    pub async fn run(&self, workflow: &Workflow, initial: Context) -> RunOutcome {
        let mut context = initial;
        let mut log = Vec::with_capacity(workflow.len());
        let mut timeline = ExecutionTimeline::new();

        info!(
            "Running workflow '{}' ({} steps)",
            workflow.name,
            workflow.len()
        );

        for step in workflow.steps() {
            if self.is_cancelled() {
                warn!("Workflow '{}' cancelled before step '{}'", workflow.name, step.name);
                return RunOutcome {
                    workflow: workflow.name.clone(),
                    status: RunStatus::Cancelled,
                    halted_at: None,
                    halt_cause: None,
                    context,
                    log,
                    timeline,
                };
            }

            timeline.add_event(step.name.as_str(), EventType::Started);
            let execution = execute_step(step, &context).await;

            context.extend(execution.bindings);
            self.sink.emit(&execution.record);

            let event = if execution.record.is_success() {
                EventType::Succeeded
            } else {
                EventType::Failed
            };
            timeline.add_event(step.name.as_str(), event);
            log.push(execution.record);

            if let Some(cause) = execution.halt {
                error!("Workflow '{}' halted at step '{}': {}", workflow.name, step.name, cause);
                return RunOutcome {
                    workflow: workflow.name.clone(),
                    status: RunStatus::Halted,
                    halted_at: Some(step.name.clone()),
                    halt_cause: Some(cause),
                    context,
                    log,
                    timeline,
                };
            }
        }

        info!("Workflow '{}' completed", workflow.name);
        RunOutcome {
            workflow: workflow.name.clone(),
            status: RunStatus::Completed,
            halted_at: None,
            halt_cause: None,
            context,
            log,
            timeline,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
