//! Workflow Parser
//!
//! Handles loading and parsing declarative step tables from YAML. Every
//! table is validated before it is handed back, so callers only ever see
//! workflows whose data flow is sound.

use std::error::Error;
use std::fs;

use log::{debug, info};

use super::definition::WorkflowDef;
use super::validator::validate_workflow;

/// Parses and validates a step table from YAML text.
pub fn parse_workflow(yaml_content: &str) -> Result<WorkflowDef, Box<dyn Error>> {
    let workflow: WorkflowDef = serde_yaml::from_str(yaml_content).map_err(|e| {
        format!(
            "Failed to parse workflow YAML: {}. Check the file format.",
            e
        )
    })?;

    info!(
        "Parsed workflow '{}': {} steps, {} inputs",
        workflow.name,
        workflow.steps.len(),
        workflow.inputs.len()
    );

    validate_workflow(&workflow)?;

    Ok(workflow)
}

/// Loads a step table from a YAML file.
///
/// This function:
/// 1. Reads and parses the YAML file
/// 2. Validates step fields and data flow between steps
///
/// # Example
///
/// ```rust,no_run
/// use cdnflow::workflow::load_workflow;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_workflow("provision.yaml")?;
///     println!("Loaded {} steps", workflow.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_workflow(path: &str) -> Result<WorkflowDef, Box<dyn Error>> {
    info!("Loading workflow from: {}", path);

    let yaml_content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read workflow file '{}': {}. Check that the file exists and is readable.",
            path, e
        )
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    parse_workflow(&yaml_content)
}

/// Saves a step table to a YAML file.
pub fn save_workflow(workflow: &WorkflowDef, path: &str) -> Result<(), Box<dyn Error>> {
    let yaml_content = serde_yaml::to_string(workflow)?;
    fs::write(path, yaml_content)?;
    info!("Workflow saved to: {}", path);
    Ok(())
}
