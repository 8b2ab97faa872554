//! Workflow Definition Module
//!
//! Provides data structures and utilities for defining, parsing, and
//! validating provisioning workflows.
//!
//! # Structure
//!
//! - [`model`]: Runtime structures (Step, Workflow, Binding, Gate, Fallback)
//! - [`context`]: Run context, templates and value paths
//! - [`definition`]: Declarative step tables and their compilation
//! - [`parser`]: YAML parsing and loading
//! - [`validator`]: Field and data-flow validation
//! - [`playbooks`]: Built-in step tables

pub mod context;
pub mod definition;
pub mod model;
pub mod parser;
pub mod playbooks;
pub mod validator;

pub use context::Context;
pub use definition::{FallbackDef, RequestDef, StepDef, WorkflowDef};
pub use model::{Binding, Fallback, FallbackTrigger, Gate, Pick, Step, Workflow};
pub use parser::{load_workflow, parse_workflow};
pub use validator::validate_workflow;
