//! Built-in Playbooks
//!
//! Step tables shipped inside the binary. They are ordinary YAML workflows
//! and go through the same parser and validator as user files.

use std::error::Error;

use super::definition::WorkflowDef;
use super::parser::parse_workflow;

const PROVISION: &str = include_str!("../../workflows/provision.yaml");
const ONBOARDING: &str = include_str!("../../workflows/onboarding.yaml");

const PLAYBOOKS: &[(&str, &str)] = &[("provision", PROVISION), ("onboarding", ONBOARDING)];

/// Names of the built-in playbooks.
pub fn names() -> impl Iterator<Item = &'static str> {
    PLAYBOOKS.iter().map(|(name, _)| *name)
}

/// Returns true if `name` is a built-in playbook.
pub fn is_builtin(name: &str) -> bool {
    names().any(|n| n == name)
}

/// Parses the built-in playbook called `name`.
///
/// Returns `Ok(None)` for unknown names.
pub fn builtin(name: &str) -> Result<Option<WorkflowDef>, Box<dyn Error>> {
    PLAYBOOKS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, yaml)| parse_workflow(yaml))
        .transpose()
}
