//! Per-task outcomes and the aggregate result of one pooled run.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::{TaskError, ValidationError};

/// Why an early end-of-stream produced no file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The peer closed before the header block finished.
    NoHeaders,
    /// The peer closed before `expected` body bytes arrived (`None`: no Content-Length).
    ShortBody {
        received: usize,
        expected: Option<usize>,
    },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::NoHeaders => write!(f, "connection closed before response headers"),
            DropReason::ShortBody {
                received,
                expected: Some(expected),
            } => write!(f, "connection closed after {received} of {expected} body bytes"),
            DropReason::ShortBody {
                received,
                expected: None,
            } => write!(
                f,
                "connection closed after {received} body bytes without Content-Length"
            ),
        }
    }
}

/// How one task ended. Exactly one is recorded per task.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Body written to the destination. `partial` is set when an early EOF was
    /// flushed under `PartialBodyPolicy::Flush`.
    Written { bytes: usize, partial: bool },
    /// Nothing written because the response ended early.
    Dropped(DropReason),
    Failed(TaskError),
}

impl TaskOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, TaskOutcome::Written { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Written { partial: false, .. } => "written",
            TaskOutcome::Written { partial: true, .. } => "partial",
            TaskOutcome::Dropped(_) => "dropped",
            TaskOutcome::Failed(_) => "failed",
        }
    }
}

/// Outcome of one task together with where it was headed.
#[derive(Debug)]
pub struct TaskRecord {
    pub index: usize,
    pub source: String,
    pub destination: PathBuf,
    pub outcome: TaskOutcome,
}

/// Everything a run observed, ordered by task index.
#[derive(Debug, Default)]
pub struct RunReport {
    pub records: Vec<TaskRecord>,
    /// Connections opened over the run, reconnects included.
    pub connections_opened: usize,
    /// Bytes read off the wire during this run (headers included).
    pub bytes_received: u64,
    pub elapsed: Duration,
    /// Set when the task list was rejected and the run did nothing.
    pub skipped: Option<ValidationError>,
}

impl RunReport {
    pub(crate) fn skipped(reason: ValidationError) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn written(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.iter().filter(|r| r.outcome.is_written())
    }

    pub fn dropped(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, TaskOutcome::Dropped(_)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, TaskOutcome::Failed(_)))
    }

    /// True when the run did work and every task was written in full.
    pub fn is_complete_success(&self) -> bool {
        self.skipped.is_none()
            && self.records.iter().all(|r| {
                matches!(
                    r.outcome,
                    TaskOutcome::Written { partial: false, .. }
                )
            })
    }

    /// Serializable view for machine-readable output.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total: self.records.len(),
            written: self.written().count(),
            dropped: self.dropped().count(),
            failed: self.failed().count(),
            connections_opened: self.connections_opened,
            bytes_received: self.bytes_received,
            elapsed_secs: self.elapsed.as_secs_f64(),
            skipped: self.skipped.map(|e| e.to_string()),
            tasks: self
                .records
                .iter()
                .map(|r| TaskSummary {
                    index: r.index,
                    source: r.source.clone(),
                    destination: r.destination.display().to_string(),
                    status: r.outcome.label(),
                    bytes: match r.outcome {
                        TaskOutcome::Written { bytes, .. } => Some(bytes),
                        _ => None,
                    },
                    error: match &r.outcome {
                        TaskOutcome::Written { .. } => None,
                        TaskOutcome::Dropped(reason) => Some(reason.to_string()),
                        TaskOutcome::Failed(e) => Some(e.to_string()),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub written: usize,
    pub dropped: usize,
    pub failed: usize,
    pub connections_opened: usize,
    pub bytes_received: u64,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub index: usize,
    pub source: String,
    pub destination: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, outcome: TaskOutcome) -> TaskRecord {
        TaskRecord {
            index,
            source: format!("https://h.example/{index}"),
            destination: PathBuf::from(format!("out/{index}")),
            outcome,
        }
    }

    #[test]
    fn summary_counts_each_outcome() {
        let report = RunReport {
            records: vec![
                record(0, TaskOutcome::Written { bytes: 5, partial: false }),
                record(1, TaskOutcome::Dropped(DropReason::NoHeaders)),
                record(2, TaskOutcome::Failed(TaskError::Status { code: 404 })),
            ],
            connections_opened: 2,
            ..RunReport::default()
        };
        assert!(!report.is_complete_success());
        let s = report.summary();
        assert_eq!((s.total, s.written, s.dropped, s.failed), (3, 1, 1, 1));
        assert_eq!(s.tasks[0].status, "written");
        assert_eq!(s.tasks[0].bytes, Some(5));
        assert_eq!(s.tasks[2].error.as_deref(), Some("HTTP 404"));
    }

    #[test]
    fn partial_write_is_not_complete_success() {
        let report = RunReport {
            records: vec![record(0, TaskOutcome::Written { bytes: 3, partial: true })],
            ..RunReport::default()
        };
        assert!(!report.is_complete_success());
        assert_eq!(report.summary().tasks[0].status, "partial");
    }

    #[test]
    fn skipped_run_is_not_success() {
        let report = RunReport::skipped(ValidationError::Empty);
        assert!(!report.is_complete_success());
        assert_eq!(report.summary().skipped.as_deref(), Some("task list is empty"));
    }

    #[test]
    fn drop_reason_messages() {
        let short = DropReason::ShortBody {
            received: 4,
            expected: Some(10),
        };
        assert_eq!(short.to_string(), "connection closed after 4 of 10 body bytes");
    }
}
