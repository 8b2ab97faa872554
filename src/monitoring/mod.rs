//! Run Monitoring Module
//!
//! Timing data collected while a workflow executes.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Step start/finish timing for run summaries

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, StepTiming, TimelineEvent};
