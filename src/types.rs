//! Core identifier and status types for the jobmill orchestration core.
//!
//! This module defines the fundamental vocabulary used throughout the system:
//! opaque job/lead identifiers and the status enums whose transition rules
//! every other module relies on.
//!
//! # Key Types
//!
//! - [`JobId`]: Opaque identifier for one asynchronous workflow execution
//! - [`JobStatus`]: Lifecycle state with an explicit transition table
//! - [`LeadId`] / [`LeadStatus`]: Identity and curation state of lead records
//! - [`ArtifactKind`]: Classification of persisted output blobs
//!
//! # Examples
//!
//! ```rust
//! use jobmill::types::{JobId, JobStatus};
//!
//! let id = JobId::fresh();
//! assert!(id.as_str().starts_with("job_"));
//!
//! assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
//! assert!(!JobStatus::Complete.can_transition_to(JobStatus::Running));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque unique identifier for a job, assigned at creation, immutable.
///
/// The rendered form is `job_` followed by twelve hex characters. Callers
/// should treat the contents as opaque; the prefix exists only to make ids
/// recognizable in logs and URLs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn fresh() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        JobId(format!("job_{}", &hex[..12]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Developer Experience: allow using string literals where a JobId is expected
// (tests, route handlers deserializing path segments).
impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

/// Identifier of a lead within its owning job's lead set.
///
/// Assigned on insertion, starting at 1, and never reused. Uniqueness is
/// scoped to the job, not global.
pub type LeadId = u64;

/// Lifecycle state of a job.
///
/// The state machine has a single initial state and three terminal states:
///
/// ```text
/// Pending -> Running             (runner claims the job)
/// Running -> Complete            (workflow returned successfully)
/// Running -> Failed              (workflow raised / returned an error)
/// Pending | Running -> Cancelled (explicit cancellation request)
/// ```
///
/// No transition is permitted out of a terminal state; the table is encoded
/// in [`can_transition_to`](Self::can_transition_to) and enforced by the
/// job store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Returns `true` for states with no outgoing transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// Whether the transition `self -> to` is legal.
    #[must_use]
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Running, Complete)
                | (Running, Failed)
                | (Pending, Cancelled)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Client-curated state of a lead record.
///
/// Independent of the owning job's status: a lead can move through this
/// lifecycle while the job is still running or long after it finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Seen,
    Called,
    Rejected,
}

impl LeadStatus {
    /// Parse from the lowercase wire form used by clients.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "seen" => Some(Self::Seen),
            "called" => Some(Self::Called),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Seen => "seen",
            Self::Called => "called",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// Classification of a persisted artifact blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Text,
    Json,
    Image,
    Video,
    Tabular,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Image => "image",
            Self::Video => "video",
            Self::Tabular => "tabular",
        };
        write!(f, "{s}")
    }
}
