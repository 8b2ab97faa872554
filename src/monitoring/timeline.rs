//! Execution Timeline
//!
//! Records when each workflow step starts and finishes so the CLI can print
//! per-step latencies of the remote calls after a run.
//!
//! Timings live here and never in the run log.

use std::time::{Duration, Instant};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step operation invoked
    Started,
    /// Step finished with a success record
    Succeeded,
    /// Step finished with an error record
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub step: String,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// Finished step with its wall-clock duration.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTiming {
    pub step: String,
    pub duration: Duration,
    pub succeeded: bool,
}

/// Tracks the execution timeline of a workflow run.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a step.
    pub fn add_event(&mut self, step: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            step: step.into(),
            event_type,
            timestamp: Instant::now(),
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Pairs start and finish events into per-step timings, in run order.
    ///
    /// Steps that started but never finished are left out.
    pub fn timings(&self) -> Vec<StepTiming> {
        let mut timings = Vec::new();
        let mut open: Option<&TimelineEvent> = None;

        for event in &self.events {
            match event.event_type {
                EventType::Started => open = Some(event),
                EventType::Succeeded | EventType::Failed => {
                    if let Some(start) = open.take().filter(|s| s.step == event.step) {
                        timings.push(StepTiming {
                            step: event.step.clone(),
                            duration: event.timestamp.duration_since(start.timestamp),
                            succeeded: event.event_type == EventType::Succeeded,
                        });
                    }
                }
            }
        }

        timings
    }

    /// Renders a plain-text latency table.
    pub fn report(&self) -> String {
        let mut output = String::from("Step timings:\n");

        for timing in self.timings() {
            let marker = if timing.succeeded { "ok " } else { "ERR" };
            output.push_str(&format!(
                "  {} {:28} {:>7} ms\n",
                marker,
                truncate(&timing.step, 28),
                timing.duration.as_millis()
            ));
        }

        output.push_str(&format!("Total: {} ms\n", self.elapsed().as_millis()));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncates a string to a maximum length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timeline_creation() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.events().is_empty());
        assert!(timeline.timings().is_empty());
    }

    #[test]
    fn test_timings_pair_events() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("create", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event("create", EventType::Succeeded);
        timeline.add_event("domain", EventType::Started);
        timeline.add_event("domain", EventType::Failed);

        let timings = timeline.timings();
        assert_eq!(timings.len(), 2);
        assert_eq!(timings[0].step, "create");
        assert!(timings[0].succeeded);
        assert!(timings[0].duration >= Duration::from_millis(20));
        assert!(!timings[1].succeeded);
    }

    #[test]
    fn test_timings_skip_unfinished() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("create", EventType::Started);

        assert!(timeline.timings().is_empty());
    }

    #[test]
    fn test_timeline_elapsed() {
        let timeline = ExecutionTimeline::new();
        thread::sleep(Duration::from_millis(30));
        assert!(timeline.elapsed().as_millis() >= 30);
    }

    #[test]
    fn test_report_lists_steps() {
        let mut timeline = ExecutionTimeline::default();
        timeline.add_event("validate_version", EventType::Started);
        timeline.add_event("validate_version", EventType::Failed);

        let report = timeline.report();
        assert!(report.contains("validate_version"));
        assert!(report.contains("ERR"));
        assert!(report.contains("Total:"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a_very_long_step_name", 10), "a_very_...");
    }
}
