//! Workflow Data Model
//!
//! Runtime structures representing a provisioning workflow: an ordered list
//! of named steps, each wrapping one operation plus the metadata the engine
//! needs to thread its result into later steps.
//!
//! Declarative step tables (YAML) live in [`definition`](super::definition)
//! and are compiled into these types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::select;
use crate::error::StepError;
use crate::execution::operation::Operation;

/// Reduction applied to an array selected by a binding path.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pick {
    First,
    Last,
    /// Largest number in the array
    Max,
    /// Smallest number in the array
    Min,
}

impl Pick {
    fn apply(self, value: Value) -> Option<Value> {
        let Value::Array(items) = value else {
            return Some(value);
        };

        match self {
            Pick::First => items.into_iter().next(),
            Pick::Last => items.into_iter().last(),
            Pick::Max => numeric_extreme(items, |a, b| a > b),
            Pick::Min => numeric_extreme(items, |a, b| a < b),
        }
    }
}

fn numeric_extreme(items: Vec<Value>, better: impl Fn(f64, f64) -> bool) -> Option<Value> {
    let mut best: Option<(f64, Value)> = None;
    for item in items {
        let Some(n) = item.as_f64() else { continue };
        match &best {
            Some((current, _)) if !better(n, *current) => {}
            _ => best = Some((n, item)),
        }
    }
    best.map(|(_, value)| value)
}

/// Stores part of a step's successful result into the context.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Binding {
    /// Context key written by this binding
    pub key: String,

    /// Path into the result value
    pub path: String,

    /// Optional reduction when the path selects an array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick: Option<Pick>,
}

impl Binding {
    pub fn new(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            pick: None,
        }
    }

    /// Sets the reduction applied to array selections.
    pub fn pick(mut self, pick: Pick) -> Self {
        self.pick = Some(pick);
        self
    }

    /// Extracts the bound value from a result.
    pub fn extract(&self, value: &Value) -> Result<Value, StepError> {
        let selected = select(value, &self.path);
        let reduced = match (selected, self.pick) {
            (Some(v), Some(pick)) => pick.apply(v),
            (selected, None) => selected,
            (None, Some(_)) => None,
        };

        reduced.ok_or_else(|| StepError::Binding {
            path: self.path.clone(),
        })
    }
}

/// Predicate on a step's successful result: `path` must equal `equals`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Gate {
    pub path: String,
    pub equals: Value,
}

impl Gate {
    pub fn new(path: impl Into<String>, equals: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            equals: equals.into(),
        }
    }

    /// Evaluates the predicate. A missing field counts as a mismatch.
    pub fn check(&self, value: &Value) -> Result<(), StepError> {
        let actual = select(value, &self.path);
        if actual.as_ref() == Some(&self.equals) {
            return Ok(());
        }

        Err(StepError::GateFailed {
            path: self.path.clone(),
            expected: self.equals.clone(),
            actual,
        })
    }
}

/// When a step's fallback operation runs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTrigger {
    /// Only when the primary call or its bindings failed
    #[default]
    OnError,
    /// After every primary call; a successful fallback supersedes the primary
    Always,
}

/// Secondary operation tried when a step's primary operation fails.
#[derive(Clone)]
pub struct Fallback {
    pub operation: Arc<dyn Operation>,
    pub bind: Vec<Binding>,
    pub trigger: FallbackTrigger,
}

impl Fallback {
    pub fn new(operation: impl Operation + 'static) -> Self {
        Self::from_arc(Arc::new(operation))
    }

    pub fn from_arc(operation: Arc<dyn Operation>) -> Self {
        Self {
            operation,
            bind: Vec::new(),
            trigger: FallbackTrigger::OnError,
        }
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bind.push(binding);
        self
    }

    pub fn with_trigger(mut self, trigger: FallbackTrigger) -> Self {
        self.trigger = trigger;
        self
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fallback")
            .field("operation", &self.operation.describe())
            .field("bind", &self.bind)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// A single step in a workflow.
///
/// # Example
///
/// ```
/// use cdnflow::execution::operation::ConstOperation;
/// use cdnflow::workflow::{Binding, Gate, Step};
/// use serde_json::json;
///
/// let step = Step::new("validate", ConstOperation::new(json!({"status": "ok"})))
///     .required()
///     .with_gate(Gate::new("status", "ok"));
///
/// let create = Step::new("create", ConstOperation::new(json!({"id": "svc1"})))
///     .with_binding(Binding::new("service_id", "id"));
/// assert_eq!(create.bind.len(), 1);
/// ```
#[derive(Clone)]
pub struct Step {
    /// Unique name within the workflow
    pub name: String,

    /// The unit of remote work this step performs
    pub operation: Arc<dyn Operation>,

    /// Whether a failure halts the run
    pub required: bool,

    /// Output bindings applied on success
    pub bind: Vec<Binding>,

    /// Predicate that halts the run when false
    pub gate: Option<Gate>,

    pub fallback: Option<Fallback>,
}

impl Step {
    /// Creates a best-effort step with no bindings.
    pub fn new(name: impl Into<String>, operation: impl Operation + 'static) -> Self {
        Self::from_arc(name, Arc::new(operation))
    }

    pub fn from_arc(name: impl Into<String>, operation: Arc<dyn Operation>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            operation,
            required: false,
            bind: Vec::new(),
            gate: None,
            fallback: None,
        }
    }

    /// Marks the step as required: a failure halts the run.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bind.push(binding);
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("operation", &self.operation.describe())
            .field("required", &self.required)
            .field("bind", &self.bind)
            .field("gate", &self.gate)
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// An immutable, ordered sequence of steps.
#[derive(Debug, Clone, Default)]
pub struct Workflow {
    pub name: String,
    steps: Vec<Step>,
}

impl Workflow {
    /// Creates a new empty workflow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Creates a workflow from a list of steps, rejecting duplicate names.
    pub fn from_steps(name: impl Into<String>, steps: Vec<Step>) -> Result<Self, String> {
        let mut workflow = Self::new(name);
        for step in steps {
            workflow.add_step(step)?;
        }
        Ok(workflow)
    }

    /// Appends a step to the workflow.
    pub fn add_step(&mut self, step: Step) -> Result<(), String> {
        if self.steps.iter().any(|s| s.name == step.name) {
            return Err(format!("Step '{}' already exists", step.name));
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Gets a step by name.
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
