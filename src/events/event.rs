use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::{JobId, JobStatus};

/// A structured progress event emitted while a job runs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobEvent {
    /// A log line appended to a job, mirrored from the store.
    Log {
        job_id: JobId,
        line: String,
        when: DateTime<Utc>,
    },
    /// A lifecycle transition.
    Status {
        job_id: JobId,
        status: JobStatus,
        when: DateTime<Utc>,
    },
    /// Out-of-band diagnostics not tied to a single job mutation.
    Diagnostic {
        scope: String,
        message: String,
        when: DateTime<Utc>,
    },
}

impl JobEvent {
    pub fn log(job_id: JobId, line: impl Into<String>) -> Self {
        JobEvent::Log {
            job_id,
            line: line.into(),
            when: Utc::now(),
        }
    }

    pub fn status(job_id: JobId, status: JobStatus) -> Self {
        JobEvent::Status {
            job_id,
            status,
            when: Utc::now(),
        }
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        JobEvent::Diagnostic {
            scope: scope.into(),
            message: message.into(),
            when: Utc::now(),
        }
    }

    /// The job this event belongs to, if any.
    #[must_use]
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            JobEvent::Log { job_id, .. } | JobEvent::Status { job_id, .. } => Some(job_id),
            JobEvent::Diagnostic { .. } => None,
        }
    }

    #[must_use]
    pub fn when(&self) -> DateTime<Utc> {
        match self {
            JobEvent::Log { when, .. }
            | JobEvent::Status { when, .. }
            | JobEvent::Diagnostic { when, .. } => *when,
        }
    }

    /// Normalized JSON shape for wire consumers:
    /// `{"type", "job_id"?, "message", "timestamp"}`.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        let (event_type, message) = match self {
            JobEvent::Log { line, .. } => ("log", line.clone()),
            JobEvent::Status { status, .. } => ("status", status.to_string()),
            JobEvent::Diagnostic { scope, message, .. } => {
                ("diagnostic", format!("{scope}: {message}"))
            }
        };
        let mut value = json!({
            "type": event_type,
            "message": message,
            "timestamp": self.when().to_rfc3339(),
        });
        if let Some(job_id) = self.job_id() {
            value["job_id"] = json!(job_id);
        }
        value
    }
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobEvent::Log { job_id, line, .. } => write!(f, "[{job_id}] {line}"),
            JobEvent::Status { job_id, status, .. } => write!(f, "[{job_id}] -> {status}"),
            JobEvent::Diagnostic { scope, message, .. } => write!(f, "[{scope}] {message}"),
        }
    }
}
