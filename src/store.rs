//! Concurrency-safe, in-memory job storage.
//!
//! The store is the authoritative record of job identity, status, ordered
//! logs, result payload, and artifact references. It is laid out as an arena
//! keyed by [`JobId`] with one lock per entry, so operations on different
//! jobs never contend; the outer map lock is held only long enough to clone
//! the entry handle.
//!
//! All reads return defensive copies: a concurrent reader can never observe
//! a partially-updated job, and a snapshot taken before a mutation is not
//! retroactively changed by it.
//!
//! Records are ephemeral. Nothing here survives a process restart; artifacts
//! are the only durable output (see [`crate::artifacts`]).

use std::sync::{Arc, Mutex, RwLock};

use chrono::{Duration, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::job::{ArtifactRef, Job, LogLine};
use crate::types::{JobId, JobStatus};

/// Errors surfaced by job store operations.
///
/// Both variants are local programming errors from the caller's perspective
/// and are never silently absorbed.
#[derive(Debug, Error, Diagnostic)]
pub enum JobStoreError {
    /// The id does not name a live job.
    #[error("job not found: {id}")]
    #[diagnostic(
        code(jobmill::store::job_not_found),
        help("The job may have been evicted, or the id was never issued.")
    )]
    JobNotFound { id: JobId },

    /// The requested status change violates the lifecycle table.
    #[error("invalid transition: {from} -> {to}")]
    #[diagnostic(
        code(jobmill::store::invalid_transition),
        help("Jobs move pending -> running -> complete|failed, with cancellation from pending or running. Terminal states are final.")
    )]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

type JobEntry = Arc<Mutex<Job>>;

/// Thread-safe in-memory job table with per-job locking.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<FxHashMap<JobId, JobEntry>>,
}

impl JobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a job in `Pending` and return its id.
    #[instrument(skip(self, input))]
    pub fn create(&self, miniapp_id: impl Into<String> + std::fmt::Debug, input: Value) -> JobId {
        let job = Job::new(miniapp_id, input);
        let id = job.id.clone();
        self.jobs
            .write()
            .expect("job table lock poisoned")
            .insert(id.clone(), Arc::new(Mutex::new(job)));
        tracing::debug!(job = %id, "job created");
        id
    }

    /// Append a timestamped log line and bump `updated_at`.
    #[instrument(skip(self, line), err)]
    pub fn append_log(
        &self,
        id: &JobId,
        line: impl Into<String>,
    ) -> Result<LogLine, JobStoreError> {
        let entry = self.entry(id)?;
        let mut job = entry.lock().expect("job entry lock poisoned");
        Ok(job.push_log(line))
    }

    /// Append an artifact reference.
    #[instrument(skip(self, artifact), err)]
    pub fn add_artifact(&self, id: &JobId, artifact: ArtifactRef) -> Result<(), JobStoreError> {
        let entry = self.entry(id)?;
        let mut job = entry.lock().expect("job entry lock poisoned");
        job.push_artifact(artifact);
        Ok(())
    }

    /// Record coarse progress for polling observers.
    ///
    /// The fraction is clamped into `0.0..=1.0`; `step` replaces the current
    /// step description when given.
    #[instrument(skip(self, step), err)]
    pub fn set_progress(
        &self,
        id: &JobId,
        fraction: f64,
        step: Option<String>,
    ) -> Result<(), JobStoreError> {
        let entry = self.entry(id)?;
        let mut job = entry.lock().expect("job entry lock poisoned");
        job.set_progress(fraction, step);
        Ok(())
    }

    /// Apply a status change, validating it against the lifecycle table.
    ///
    /// `error` is recorded only when entering `Failed`. Entering any terminal
    /// state stamps `completed_at` exactly once.
    #[instrument(skip(self), err)]
    pub fn set_status(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(), JobStoreError> {
        let entry = self.entry(id)?;
        let mut job = entry.lock().expect("job entry lock poisoned");
        if !job.status.can_transition_to(status) {
            return Err(JobStoreError::InvalidTransition {
                from: job.status,
                to: status,
            });
        }
        job.enter_status(status, error);
        tracing::debug!(job = %id, status = %status, "status transition");
        Ok(())
    }

    /// Transition `Running -> Complete` and store the final result.
    ///
    /// This is the only way to set `result`; the payload and the transition
    /// land under one lock acquisition so no reader sees a completed job
    /// without its result.
    #[instrument(skip(self, result), err)]
    pub fn complete(&self, id: &JobId, result: Value) -> Result<(), JobStoreError> {
        let entry = self.entry(id)?;
        let mut job = entry.lock().expect("job entry lock poisoned");
        if !job.status.can_transition_to(JobStatus::Complete) {
            return Err(JobStoreError::InvalidTransition {
                from: job.status,
                to: JobStatus::Complete,
            });
        }
        job.set_result(result);
        job.enter_status(JobStatus::Complete, None);
        tracing::debug!(job = %id, "job complete");
        Ok(())
    }

    /// Return a snapshot (defensive copy) of the job.
    pub fn get(&self, id: &JobId) -> Result<Job, JobStoreError> {
        let entry = self.entry(id)?;
        let job = entry.lock().expect("job entry lock poisoned");
        Ok(job.clone())
    }

    /// Current status without cloning the whole record.
    pub fn status(&self, id: &JobId) -> Result<JobStatus, JobStoreError> {
        let entry = self.entry(id)?;
        let job = entry.lock().expect("job entry lock poisoned");
        Ok(job.status)
    }

    /// Snapshot all jobs, optionally filtered by mini-app, newest first.
    #[must_use]
    pub fn list(&self, miniapp_id: Option<&str>) -> Vec<Job> {
        let entries: Vec<JobEntry> = self
            .jobs
            .read()
            .expect("job table lock poisoned")
            .values()
            .cloned()
            .collect();
        let mut jobs: Vec<Job> = entries
            .iter()
            .map(|e| e.lock().expect("job entry lock poisoned").clone())
            .filter(|j| miniapp_id.is_none_or(|m| j.miniapp_id == m))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Evict a job. Returns whether it existed.
    pub fn delete(&self, id: &JobId) -> bool {
        self.jobs
            .write()
            .expect("job table lock poisoned")
            .remove(id)
            .is_some()
    }

    /// Evict non-running jobs created more than `max_age` ago.
    ///
    /// Returns the number of evicted jobs. Running jobs are never evicted,
    /// no matter how old.
    #[instrument(skip(self))]
    pub fn cleanup_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut table = self.jobs.write().expect("job table lock poisoned");
        let stale: Vec<JobId> = table
            .iter()
            .filter(|(_, entry)| {
                let job = entry.lock().expect("job entry lock poisoned");
                job.created_at < cutoff && job.status != JobStatus::Running
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            table.remove(id);
        }
        if !stale.is_empty() {
            tracing::info!(evicted = stale.len(), "stale jobs evicted");
        }
        stale.len()
    }

    fn entry(&self, id: &JobId) -> Result<JobEntry, JobStoreError> {
        self.jobs
            .read()
            .expect("job table lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| JobStoreError::JobNotFound { id: id.clone() })
    }
}
