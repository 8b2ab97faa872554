//! Individual Step Execution
//!
//! The uniform wrapper every step runs through:
//! - Invoke the primary operation
//! - Try the fallback when its trigger fires
//! - Apply output bindings (all or nothing)
//! - Evaluate the gate on the final successful value
//!
//! Nothing here touches the run context directly; the engine commits the
//! returned bindings.

use log::{debug, warn};
use serde_json::Value;

use super::operation::Operation;
use super::outcome::LogRecord;
use crate::error::StepError;
use crate::workflow::context::Context;
use crate::workflow::model::{Binding, FallbackTrigger, Step};

/// Result of running one step.
#[derive(Debug)]
pub struct StepExecution {
    /// Record to emit and append to the run log
    pub record: LogRecord,

    /// Context entries produced by the step's bindings
    pub bindings: Context,

    /// Set when the run must stop after this step
    pub halt: Option<StepError>,
}

/// Executes a single workflow step against the current context.
///
/// # Failure Policy
///
/// - Remote, template and binding errors produce an error record; they halt
///   the run only when the step is required.
/// - A gate that does not hold always halts the run, after the bindings of
///   the successful call have been produced.
pub async fn execute_step(step: &Step, ctx: &Context) -> StepExecution {
    debug!("Executing step '{}': {}", step.name, step.operation.describe());

    let primary = attempt(step.operation.as_ref(), &step.bind, ctx).await;

    let (result, primary_error) = match (&step.fallback, primary) {
        (Some(fallback), Err(error)) => {
            debug!("Step '{}' primary failed ({}), trying fallback", step.name, error);
            let result = attempt(fallback.operation.as_ref(), &fallback.bind, ctx).await;
            (result, Some(error))
        }
        (Some(fallback), Ok((value, mut bindings))) if fallback.trigger == FallbackTrigger::Always => {
            match attempt(fallback.operation.as_ref(), &fallback.bind, ctx).await {
                Ok((fallback_value, fallback_bindings)) => {
                    bindings.extend(fallback_bindings);
                    (Ok((fallback_value, bindings)), None)
                }
                Err(error) => {
                    warn!("Step '{}' fallback failed, keeping primary result: {}", step.name, error);
                    (Ok((value, bindings)), None)
                }
            }
        }
        (_, primary) => (primary, None),
    };

    match result {
        Ok((value, bindings)) => {
            let halt = step.gate.as_ref().and_then(|gate| gate.check(&value).err());
            StepExecution {
                record: LogRecord::success(&step.name, value).with_primary_error(primary_error),
                bindings,
                halt,
            }
        }
        Err(error) => {
            let halt = step.required.then(|| error.clone());
            StepExecution {
                record: LogRecord::failure(&step.name, error).with_primary_error(primary_error),
                bindings: Context::new(),
                halt,
            }
        }
    }
}

/// Calls an operation and extracts its bindings.
async fn attempt(
    operation: &dyn Operation,
    bindings: &[Binding],
    ctx: &Context,
) -> Result<(Value, Context), StepError> {
    let value = operation.call(ctx).await?;
    let bound = apply_bindings(&value, bindings)?;
    Ok((value, bound))
}

/// Extracts every binding from `value`, failing on the first missing path.
pub fn apply_bindings(value: &Value, bindings: &[Binding]) -> Result<Context, StepError> {
    let mut bound = Context::new();
    for binding in bindings {
        bound.insert(binding.key.clone(), binding.extract(value)?);
    }
    Ok(bound)
}
