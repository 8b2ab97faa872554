//! Workflow Execution Module
//!
//! Provides the engine that runs workflow steps in order, the operations
//! steps wrap, and the structured records a run produces.
//!
//! # Architecture
//!
//! - [`engine`]: Main execution engine orchestrating workflow runs
//! - [`step`]: Individual step execution logic (fallback, bindings, gate)
//! - [`operation`]: The async operation seam and its implementations
//! - [`outcome`]: Log records, sinks and run outcomes

pub mod engine;
pub mod operation;
pub mod outcome;
pub mod step;

pub use engine::Engine;
pub use operation::{ConstOperation, FnOperation, HttpOperation, Operation, TemplateOperation};
pub use outcome::{LogFacadeSink, LogRecord, LogSink, RecordStatus, RunOutcome, RunStatus};
