//! cdnflow - Declarative CDN Provisioning Workflows
//!
//! Runs ordered sequences of control-plane API calls against a CDN vendor's
//! REST API. Each call is a named step; steps pass results to later steps
//! through explicit output bindings, failures are either tolerated or halt
//! the run, and a gate can stop the run when a response does not look right
//! (for example a service version that failed validation).
//!
//! # Architecture
//!
//! The library is organized into six modules:
//!
//! - [`workflow`]: Step tables, run context, parsing and validation
//! - [`execution`]: Sequential engine, operations and run outcomes
//! - [`api`]: HTTP client for the control-plane API
//! - [`config`]: Settings from file and environment
//! - [`error`]: Step and API error types
//! - [`monitoring`]: Per-step execution timeline
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cdnflow::api::ApiClient;
//! use cdnflow::config::Settings;
//! use cdnflow::execution::Engine;
//! use cdnflow::workflow::playbooks;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load(None)?;
//!     let client = ApiClient::new(&settings.api_url, settings.require_token()?, settings.timeout())?;
//!
//!     let definition = playbooks::builtin("provision")?.ok_or("unknown playbook")?;
//!     let workflow = definition.compile(Arc::new(client))?;
//!
//!     let outcome = Engine::new()
//!         .run(&workflow, settings.initial_context(chrono::Utc::now()))
//!         .await;
//!     println!("{:?}: {} steps", outcome.status, outcome.log.len());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod workflow;

// Re-export commonly used types
pub use error::{ApiError, StepError};
pub use execution::engine::Engine;
pub use execution::outcome::{RunOutcome, RunStatus};
pub use workflow::context::Context;
pub use workflow::model::{Step, Workflow};
pub use workflow::parser::load_workflow;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "cdnflow";
