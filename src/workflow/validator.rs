//! Workflow Validation
//!
//! Static checks on a declarative step table before it is compiled:
//! - Step field validation
//! - Unique step names
//! - Data flow: every `${key}` a step reads is a declared input or is bound
//!   by a strictly earlier step

use std::collections::HashSet;

use log::{debug, info};

use super::definition::{StepDef, WorkflowDef};

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyWorkflowName,
    EmptyWorkflow,
    EmptyStepName,
    DuplicateStepName(String),
    EmptyPath(String),
    ConflictingBody(String),
    EmptyBinding(String),
    EmptyGatePath(String),
    InvalidFallback(String),
    UnboundKey { step: String, key: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWorkflowName => write!(f, "Workflow has no name"),
            Self::EmptyWorkflow => write!(f, "Workflow has no steps"),
            Self::EmptyStepName => write!(f, "Step has empty or whitespace-only name"),
            Self::DuplicateStepName(name) => write!(f, "Duplicate step name: '{}'", name),
            Self::EmptyPath(step) => write!(f, "Step '{}' has no request path", step),
            Self::ConflictingBody(step) => {
                write!(f, "Step '{}' request has both a form and a JSON body", step)
            }
            Self::EmptyBinding(step) => {
                write!(f, "Step '{}' has a binding with an empty key or path", step)
            }
            Self::EmptyGatePath(step) => write!(f, "Step '{}' has a gate with an empty path", step),
            Self::InvalidFallback(step) => write!(
                f,
                "Step '{}': fallback needs exactly one of 'request' or 'value'",
                step
            ),
            Self::UnboundKey { step, key } => write!(
                f,
                "Step '{}' reads '{}' which is neither an input nor bound by an earlier step",
                step, key
            ),
        }
    }
}

/// Validates a single step's fields.
fn validate_step(step: &StepDef) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if step.name.trim().is_empty() {
        errors.push(ValidationError::EmptyStepName);
        return errors; // Can't validate further without a name
    }

    if step.request.path.trim().is_empty() {
        errors.push(ValidationError::EmptyPath(step.name.clone()));
    }

    if step.request.json.is_some() && !step.request.form.is_empty() {
        errors.push(ValidationError::ConflictingBody(step.name.clone()));
    }

    let fallback_bindings = step.fallback.iter().flat_map(|f| f.bind.iter());
    if step
        .bind
        .iter()
        .chain(fallback_bindings)
        .any(|b| b.key.trim().is_empty() || b.path.trim().is_empty())
    {
        errors.push(ValidationError::EmptyBinding(step.name.clone()));
    }

    if let Some(gate) = &step.gate {
        if gate.path.trim().is_empty() {
            errors.push(ValidationError::EmptyGatePath(step.name.clone()));
        }
    }

    if let Some(fallback) = &step.fallback {
        if fallback.request.is_some() == fallback.value.is_some() {
            errors.push(ValidationError::InvalidFallback(step.name.clone()));
        }
        if let Some(request) = &fallback.request {
            if request.json.is_some() && !request.form.is_empty() {
                errors.push(ValidationError::ConflictingBody(step.name.clone()));
            }
        }
    }

    if step.required {
        debug!("Step '{}' is required", step.name);
    }

    errors
}

/// Validates the entire step table.
///
/// Performs the following checks:
/// 1. Workflow has a name and at least one step
/// 2. No duplicate step names
/// 3. All steps have valid fields
/// 4. Every context key a step reads is available when the step runs
pub fn validate_workflow(workflow: &WorkflowDef) -> Result<(), String> {
    info!(
        "Validating workflow '{}' with {} steps",
        workflow.name,
        workflow.steps.len()
    );

    if workflow.name.trim().is_empty() {
        return Err(ValidationError::EmptyWorkflowName.to_string());
    }

    if workflow.steps.is_empty() {
        return Err(ValidationError::EmptyWorkflow.to_string());
    }

    let mut seen_names: HashSet<&str> = HashSet::new();
    for step in &workflow.steps {
        if !seen_names.insert(step.name.as_str()) {
            return Err(ValidationError::DuplicateStepName(step.name.clone()).to_string());
        }
    }

    let mut all_errors = Vec::new();
    let mut available: HashSet<&str> = workflow.inputs.iter().map(String::as_str).collect();

    for step in &workflow.steps {
        all_errors.extend(validate_step(step));

        let mut reads = step.request.referenced_keys();
        if let Some(fallback) = &step.fallback {
            reads.extend(fallback.referenced_keys());
        }

        for key in reads {
            if !available.contains(key.as_str()) {
                all_errors.push(ValidationError::UnboundKey {
                    step: step.name.clone(),
                    key,
                });
            }
        }

        // Keys become readable only for strictly later steps
        available.extend(step.bound_keys());
    }

    if !all_errors.is_empty() {
        let error_messages: Vec<String> = all_errors.iter().map(|e| e.to_string()).collect();
        return Err(error_messages.join("\n"));
    }

    info!("Workflow '{}' validated", workflow.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpMethod;
    use crate::workflow::definition::{FallbackDef, RequestDef};
    use crate::workflow::model::{Binding, Gate};
    use serde_json::json;

    fn get(name: &str, path: &str) -> StepDef {
        StepDef::new(name, RequestDef::new(HttpMethod::Get, path))
    }

    fn workflow(inputs: &[&str], steps: Vec<StepDef>) -> WorkflowDef {
        WorkflowDef {
            name: "test".to_string(),
            description: None,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            steps,
        }
    }

    #[test]
    fn test_valid_workflow() {
        let mut create = StepDef::new("create", RequestDef::new(HttpMethod::Post, "/service"));
        create.bind.push(Binding::new("service_id", "id"));

        let wf = workflow(&[], vec![create, get("read", "/service/${service_id}")]);
        assert!(validate_workflow(&wf).is_ok());
    }

    #[test]
    fn test_empty_workflow() {
        assert!(validate_workflow(&workflow(&[], Vec::new())).is_err());
    }

    #[test]
    fn test_empty_workflow_name() {
        let mut wf = workflow(&[], vec![get("a", "/a")]);
        wf.name = " ".to_string();
        assert_eq!(
            validate_workflow(&wf).unwrap_err(),
            ValidationError::EmptyWorkflowName.to_string()
        );
    }

    #[test]
    fn test_duplicate_names() {
        let wf = workflow(&[], vec![get("same", "/a"), get("same", "/b")]);
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.contains("Duplicate step name"));
    }

    #[test]
    fn test_forward_reference_rejected() {
        let mut create = StepDef::new("create", RequestDef::new(HttpMethod::Post, "/service"));
        create.bind.push(Binding::new("service_id", "id"));

        let wf = workflow(&[], vec![get("read", "/service/${service_id}"), create]);
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.contains("'read' reads 'service_id'"));
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut step = get("read", "/service/${service_id}");
        step.bind.push(Binding::new("service_id", "id"));

        assert!(validate_workflow(&workflow(&[], vec![step])).is_err());
    }

    #[test]
    fn test_inputs_are_available() {
        let wf = workflow(&["customer_id"], vec![get("events", "/events")]);
        assert!(validate_workflow(&wf).is_ok());

        let mut events = get("events", "/events");
        events.request.query.insert("filter[customer_id]".to_string(), json!("${customer_id}"));
        assert!(validate_workflow(&workflow(&["customer_id"], vec![events.clone()])).is_ok());
        assert!(validate_workflow(&workflow(&[], vec![events])).is_err());
    }

    #[test]
    fn test_fallback_reads_are_checked() {
        let mut create = StepDef::new("create", RequestDef::new(HttpMethod::Post, "/service"));
        create.fallback = Some(FallbackDef {
            request: Some(RequestDef::new(HttpMethod::Get, "/service/${fallback_service_id}/version")),
            ..Default::default()
        });

        assert!(validate_workflow(&workflow(&[], vec![create.clone()])).is_err());
        assert!(validate_workflow(&workflow(&["fallback_service_id"], vec![create])).is_ok());
    }

    #[test]
    fn test_fallback_bindings_feed_later_steps() {
        let mut create = StepDef::new("create", RequestDef::new(HttpMethod::Post, "/service"));
        create.fallback = Some(FallbackDef {
            value: Some(json!({"id": "svc1"})),
            bind: vec![Binding::new("service_id", "id")],
            ..Default::default()
        });

        let wf = workflow(&[], vec![create, get("read", "/service/${service_id}")]);
        assert!(validate_workflow(&wf).is_ok());
    }

    #[test]
    fn test_validate_step_empty_name() {
        let errors = validate_step(&get("", "/a"));
        assert_eq!(errors, vec![ValidationError::EmptyStepName]);
    }

    #[test]
    fn test_validate_step_empty_path() {
        let errors = validate_step(&get("a", " "));
        assert!(errors.contains(&ValidationError::EmptyPath("a".to_string())));
    }

    #[test]
    fn test_validate_step_conflicting_body() {
        let mut step = get("a", "/a");
        step.request.json = Some(json!({}));
        step.request.form.insert("x".to_string(), json!(1));

        let errors = validate_step(&step);
        assert!(errors.contains(&ValidationError::ConflictingBody("a".to_string())));
    }

    #[test]
    fn test_validate_step_empty_binding_and_gate() {
        let mut step = get("a", "/a");
        step.bind.push(Binding::new("", "id"));
        step.gate = Some(Gate::new("", "ok"));

        let errors = validate_step(&step);
        assert!(errors.contains(&ValidationError::EmptyBinding("a".to_string())));
        assert!(errors.contains(&ValidationError::EmptyGatePath("a".to_string())));
    }

    #[test]
    fn test_validate_step_invalid_fallback() {
        let mut step = get("a", "/a");
        step.fallback = Some(FallbackDef::default());

        let errors = validate_step(&step);
        assert!(errors.contains(&ValidationError::InvalidFallback("a".to_string())));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyWorkflow;
        assert_eq!(err.to_string(), "Workflow has no steps");

        let err = ValidationError::DuplicateStepName("test".to_string());
        assert!(err.to_string().contains("test"));

        let err = ValidationError::UnboundKey {
            step: "s".to_string(),
            key: "k".to_string(),
        };
        assert!(err.to_string().contains("earlier step"));
    }
}
