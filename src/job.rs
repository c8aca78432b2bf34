//! The job record: one asynchronous execution of a mini-app workflow.
//!
//! [`Job`] is a plain data record; all invariant enforcement (transition
//! validation, locking) lives in [`crate::store`]. The mutators here exist so
//! the store can apply changes without reaching into fields, and they all
//! bump `updated_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::{ArtifactKind, JobId, JobStatus};

/// A single timestamped log line.
///
/// Lines are append-only and never reordered; the rendered form matches the
/// `[HH:MM:SS] message` shape clients already display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub when: DateTime<Utc>,
    pub line: String,
}

impl LogLine {
    #[must_use]
    pub fn now(line: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            line: line.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.when.format("%H:%M:%S"), self.line)
    }
}

/// Stable reference to a persisted output blob.
///
/// `path` is relative to the artifact root (`<job_id>/<filename>`), so the
/// reference stays valid if the root moves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub label: String,
    pub path: String,
}

impl ArtifactRef {
    #[must_use]
    pub fn new(kind: ArtifactKind, label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            path: path.into(),
        }
    }
}

/// Job execution record.
///
/// Created by the runner at submission time and mutated only through the
/// job store (directly by the runner, indirectly by workflow code via the
/// restricted [`JobHandle`](crate::handle::JobHandle)). Clients receive
/// defensive copies and never mutate a job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub miniapp_id: String,
    pub status: JobStatus,
    /// Coarse progress fraction in `0.0..=1.0`, for polling observers.
    pub progress: f64,
    /// Human-readable description of the step currently executing.
    pub current_step: Option<String>,
    pub logs: Vec<LogLine>,
    pub artifacts: Vec<ArtifactRef>,
    /// Final payload, set exactly once on the transition into `Complete`.
    pub result: Option<Value>,
    /// Failure description, set only on the transition into `Failed`.
    pub error: Option<String>,
    /// Submission payload, recorded for inspection and re-runs.
    pub input: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a fresh record in `Pending`.
    #[must_use]
    pub fn new(miniapp_id: impl Into<String>, input: Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::fresh(),
            miniapp_id: miniapp_id.into(),
            status: JobStatus::Pending,
            progress: 0.0,
            current_step: None,
            logs: Vec::new(),
            artifacts: Vec::new(),
            result: None,
            error: None,
            input,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Append a timestamped log line.
    pub(crate) fn push_log(&mut self, line: impl Into<String>) -> LogLine {
        let entry = LogLine::now(line);
        self.logs.push(entry.clone());
        self.touch();
        entry
    }

    /// Append an artifact reference.
    pub(crate) fn push_artifact(&mut self, artifact: ArtifactRef) {
        self.artifacts.push(artifact);
        self.touch();
    }

    /// Record coarse progress. The fraction is clamped into `0.0..=1.0`;
    /// the step is only replaced when one is given.
    pub(crate) fn set_progress(&mut self, fraction: f64, step: Option<String>) {
        self.progress = fraction.clamp(0.0, 1.0);
        if let Some(step) = step {
            self.current_step = Some(step);
        }
        self.touch();
    }

    /// Record a validated status change. The caller (the store) has already
    /// checked the transition table.
    pub(crate) fn enter_status(&mut self, status: JobStatus, error: Option<String>) {
        self.status = status;
        if status == JobStatus::Failed {
            self.error = error;
        }
        if status == JobStatus::Complete {
            self.progress = 1.0;
        }
        if status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.touch();
    }

    /// Store the final result alongside the `Complete` transition.
    pub(crate) fn set_result(&mut self, result: Value) {
        self.result = Some(result);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
