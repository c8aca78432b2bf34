//! The restricted capability object handed to workflow code.
//!
//! [`JobHandle`] is the only way a workflow touches job state: append a log
//! line, emit an artifact, insert a lead, check for cancellation. It
//! deliberately exposes no status mutation and no store access, preserving
//! the boundary between business logic and store internals; the runner
//! alone drives the lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::artifacts::ArtifactStore;
use crate::events::JobEvent;
use crate::job::ArtifactRef;
use crate::leads::{Lead, LeadDraft, LeadStore};
use crate::store::JobStore;
use crate::types::{ArtifactKind, JobId};
use crate::workflow::WorkflowError;

/// Narrow, clonable view of one job's producer-side capabilities.
///
/// Cloning is cheap; a workflow may hand clones to helper tasks. All clones
/// share the same cancellation flag.
#[derive(Clone)]
pub struct JobHandle {
    job_id: JobId,
    jobs: Arc<JobStore>,
    leads: Arc<LeadStore>,
    artifacts: Arc<ArtifactStore>,
    events: flume::Sender<JobEvent>,
    cancelled: Arc<AtomicBool>,
}

impl JobHandle {
    pub(crate) fn new(
        job_id: JobId,
        jobs: Arc<JobStore>,
        leads: Arc<LeadStore>,
        artifacts: Arc<ArtifactStore>,
        events: flume::Sender<JobEvent>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            job_id,
            jobs,
            leads,
            artifacts,
            events,
            cancelled,
        }
    }

    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Append a timestamped log line to the job and mirror it onto the
    /// event bus.
    ///
    /// The store append is authoritative and ordered; the bus mirror is
    /// best-effort observability and cannot fail the workflow.
    pub fn log(&self, line: impl Into<String>) -> Result<(), WorkflowError> {
        let entry = self.jobs.append_log(&self.job_id, line)?;
        let _ = self
            .events
            .send(JobEvent::log(self.job_id.clone(), entry.line));
        Ok(())
    }

    /// Record coarse progress for polling observers.
    ///
    /// `fraction` is clamped into `0.0..=1.0`; completion pins it to `1.0`
    /// regardless of the last reported value.
    pub fn set_progress(
        &self,
        fraction: f64,
        step: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        self.jobs
            .set_progress(&self.job_id, fraction, Some(step.into()))?;
        Ok(())
    }

    /// Persist raw bytes as an artifact and record its reference on the job.
    pub fn add_artifact(
        &self,
        filename: &str,
        content: &[u8],
        kind: ArtifactKind,
        label: impl Into<String>,
    ) -> Result<ArtifactRef, WorkflowError> {
        let artifact = self
            .artifacts
            .save(&self.job_id, filename, content, kind, label)?;
        self.jobs.add_artifact(&self.job_id, artifact.clone())?;
        Ok(artifact)
    }

    /// Persist a text artifact and record its reference on the job.
    pub fn save_text_artifact(
        &self,
        filename: &str,
        text: &str,
        label: impl Into<String>,
    ) -> Result<ArtifactRef, WorkflowError> {
        let artifact = self.artifacts.save_text(&self.job_id, filename, text, label)?;
        self.jobs.add_artifact(&self.job_id, artifact.clone())?;
        Ok(artifact)
    }

    /// Persist a JSON artifact and record its reference on the job.
    pub fn save_json_artifact(
        &self,
        filename: &str,
        value: &Value,
        label: impl Into<String>,
    ) -> Result<ArtifactRef, WorkflowError> {
        let artifact = self
            .artifacts
            .save_json(&self.job_id, filename, value, label)?;
        self.jobs.add_artifact(&self.job_id, artifact.clone())?;
        Ok(artifact)
    }

    /// Insert a lead for this job (scrape-style workflows).
    ///
    /// Fails with the lead store's `JobClosedForWrites` if the job already
    /// reached a terminal state, e.g. when racing an external cancel.
    pub fn add_lead(&self, draft: LeadDraft) -> Result<Lead, WorkflowError> {
        Ok(self.leads.add(&self.job_id, draft)?)
    }

    /// Whether cancellation has been requested for this job.
    ///
    /// Purely advisory: the runner never interrupts in-flight tool calls.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Bail out with [`WorkflowError::Cancelled`] if cancellation was
    /// requested. Well-behaved workflows call this between tool invocations:
    ///
    /// ```rust,ignore
    /// for url in urls {
    ///     handle.check_cancelled()?;
    ///     let page = tools.invoke("scrape", json!({"url": url})).await?;
    /// }
    /// ```
    pub fn check_cancelled(&self) -> Result<(), WorkflowError> {
        if self.is_cancelled() {
            Err(WorkflowError::Cancelled)
        } else {
            Ok(())
        }
    }
}
