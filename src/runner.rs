//! Background execution of mini-app workflows.
//!
//! The runner is the only component that drives the job lifecycle. It
//! creates the job, spawns the workflow on its own tokio task (never on the
//! submitting caller's stack), hands the workflow a restricted
//! [`JobHandle`], and funnels every possible exit (clean return, error,
//! panic, cooperative cancellation) into exactly one terminal transition.
//! A workflow can never leave a job stuck in `running`.
//!
//! Cancellation is advisory: [`cancel`](JobRunner::cancel) raises a per-job
//! flag and flips the status, but in-flight tool calls are not interrupted;
//! well-behaved workflows poll [`JobHandle::check_cancelled`] between tool
//! invocations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use futures_util::FutureExt;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::instrument;

use crate::artifacts::ArtifactStore;
use crate::events::{EventBus, JobEvent};
use crate::handle::JobHandle;
use crate::leads::LeadStore;
use crate::store::{JobStore, JobStoreError};
use crate::tools::ToolRegistry;
use crate::types::{JobId, JobStatus};
use crate::workflow::{Workflow, WorkflowError};

/// Per-job cooperative cancellation flags, shared with the execution tasks.
///
/// An entry lives exactly as long as its job's execution: inserted at
/// submission, removed when the execution task reaches a terminal state or
/// the job is evicted.
type CancelFlags = Arc<Mutex<FxHashMap<JobId, Arc<AtomicBool>>>>;

/// Schedules workflow execution off the request path and owns the per-job
/// cancellation flags and the event bus.
///
/// Typically constructed once at process start and shared behind an `Arc`
/// with whatever transport layer submits jobs.
pub struct JobRunner {
    jobs: Arc<JobStore>,
    leads: Arc<LeadStore>,
    artifacts: Arc<ArtifactStore>,
    tools: Arc<ToolRegistry>,
    event_bus: EventBus,
    cancel_flags: CancelFlags,
}

impl JobRunner {
    /// Create a runner with the default event bus (stdout sink) and start
    /// its listener.
    #[must_use]
    pub fn new(
        jobs: Arc<JobStore>,
        leads: Arc<LeadStore>,
        artifacts: Arc<ArtifactStore>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self::with_bus(jobs, leads, artifacts, tools, EventBus::default(), true)
    }

    /// Create a runner with a custom event bus, e.g. one wired to a
    /// [`ChannelSink`](crate::events::ChannelSink) for streaming progress to
    /// web clients.
    #[must_use]
    pub fn with_bus(
        jobs: Arc<JobStore>,
        leads: Arc<LeadStore>,
        artifacts: Arc<ArtifactStore>,
        tools: Arc<ToolRegistry>,
        event_bus: EventBus,
        start_listener: bool,
    ) -> Self {
        if start_listener {
            event_bus.listen_for_events();
        }
        Self {
            jobs,
            leads,
            artifacts,
            tools,
            event_bus,
            cancel_flags: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    #[must_use]
    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    #[must_use]
    pub fn leads(&self) -> &Arc<LeadStore> {
        &self.leads
    }

    #[must_use]
    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// The bus this runner emits progress events into.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    /// Create a job and schedule the workflow asynchronously, returning the
    /// id immediately.
    ///
    /// This is the only blocking boundary visible to the submitting caller,
    /// and it only touches in-memory state. The `pending -> running`
    /// transition happens inside the spawned task, before the workflow body
    /// runs.
    #[instrument(skip(self, workflow, input))]
    pub fn submit(
        &self,
        miniapp_id: &str,
        workflow: Arc<dyn Workflow>,
        input: Value,
    ) -> JobId {
        let id = self.jobs.create(miniapp_id, input.clone());

        let cancelled = Arc::new(AtomicBool::new(false));
        self.cancel_flags
            .lock()
            .expect("cancel flag map poisoned")
            .insert(id.clone(), cancelled.clone());

        let handle = JobHandle::new(
            id.clone(),
            self.jobs.clone(),
            self.leads.clone(),
            self.artifacts.clone(),
            self.event_bus.get_sender(),
            cancelled.clone(),
        );

        let ctx = ExecutionContext {
            id: id.clone(),
            miniapp_id: miniapp_id.to_string(),
            jobs: self.jobs.clone(),
            events: self.event_bus.get_sender(),
            cancelled,
            flags: self.cancel_flags.clone(),
        };

        tokio::spawn(execute_job(ctx, handle, workflow, self.tools.clone(), input));
        tracing::info!(job = %id, miniapp = miniapp_id, "job submitted");
        id
    }

    /// Request cancellation of a pending or running job.
    ///
    /// Raises the cooperative flag and flips the status. Cancelling a job
    /// that already reached a terminal state is a no-op; only an unknown id
    /// is an error.
    #[instrument(skip(self), err)]
    pub fn cancel(&self, id: &JobId) -> Result<(), JobStoreError> {
        let status = self.jobs.status(id)?;

        if let Some(flag) = self
            .cancel_flags
            .lock()
            .expect("cancel flag map poisoned")
            .get(id)
        {
            flag.store(true, Ordering::SeqCst);
        }

        if status.is_terminal() {
            return Ok(());
        }

        match self.jobs.set_status(id, JobStatus::Cancelled, None) {
            Ok(()) => {
                // Log only once the transition is ours, so a cancel losing
                // the race never stamps a line onto a completed job.
                let _ = self.jobs.append_log(id, "Job cancelled by user");
                let _ = self
                    .event_bus
                    .get_sender()
                    .send(JobEvent::status(id.clone(), JobStatus::Cancelled));
                Ok(())
            }
            // Lost the race against the workflow's own terminal transition;
            // the first terminal state wins.
            Err(JobStoreError::InvalidTransition { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Evict a job record together with its lead table and cancel flag.
    ///
    /// Returns whether the job existed. If the workflow is still running,
    /// its flag is raised on the way out so it winds down cooperatively.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &JobId) -> bool {
        if let Some(flag) = self
            .cancel_flags
            .lock()
            .expect("cancel flag map poisoned")
            .remove(id)
        {
            flag.store(true, Ordering::SeqCst);
        }
        self.leads.delete_table(id);
        self.jobs.delete(id)
    }

    /// Evict stale non-running jobs, dropping their lead tables and any
    /// leftover cancel flags along with the records.
    ///
    /// Returns the number of evicted jobs.
    #[instrument(skip(self))]
    pub fn cleanup_older_than(&self, max_age: Duration) -> usize {
        let evicted = self.jobs.cleanup_older_than(max_age);
        if evicted > 0 {
            self.leads.prune_orphans();
            self.cancel_flags
                .lock()
                .expect("cancel flag map poisoned")
                .retain(|id, _| self.jobs.status(id).is_ok());
        }
        evicted
    }

    /// Raise the cancellation flag for every outstanding job and stop the
    /// event listener after queued events drain.
    pub async fn shutdown(&self) {
        let flags: Vec<Arc<AtomicBool>> = self
            .cancel_flags
            .lock()
            .expect("cancel flag map poisoned")
            .values()
            .cloned()
            .collect();
        for flag in flags {
            flag.store(true, Ordering::SeqCst);
        }
        let _ = self
            .event_bus
            .get_sender()
            .send(JobEvent::diagnostic("runner", "shutdown requested"));
        self.event_bus.stop_listener().await;
    }
}

struct ExecutionContext {
    id: JobId,
    miniapp_id: String,
    jobs: Arc<JobStore>,
    events: flume::Sender<JobEvent>,
    cancelled: Arc<AtomicBool>,
    flags: CancelFlags,
}

impl ExecutionContext {
    fn emit_status(&self, status: JobStatus) {
        let _ = self.events.send(JobEvent::status(self.id.clone(), status));
    }
}

/// Drive one job to a terminal state, then release its cancel flag.
async fn execute_job(
    ctx: ExecutionContext,
    handle: JobHandle,
    workflow: Arc<dyn Workflow>,
    tools: Arc<ToolRegistry>,
    input: Value,
) {
    drive_workflow(&ctx, handle, workflow, tools, input).await;
    // The flag's lifetime is the execution's, not the record's: once no
    // workflow can observe it, keeping it would only accumulate.
    ctx.flags
        .lock()
        .expect("cancel flag map poisoned")
        .remove(&ctx.id);
}

async fn drive_workflow(
    ctx: &ExecutionContext,
    handle: JobHandle,
    workflow: Arc<dyn Workflow>,
    tools: Arc<ToolRegistry>,
    input: Value,
) {
    // Claim the job. This fails only if something else already moved it out
    // of `pending` (an early cancel); nothing to run in that case.
    if let Err(e) = ctx.jobs.set_status(&ctx.id, JobStatus::Running, None) {
        tracing::debug!(job = %ctx.id, error = %e, "job not claimable, skipping execution");
        return;
    }
    ctx.emit_status(JobStatus::Running);
    let _ = handle.log(format!("Starting workflow: {}", ctx.miniapp_id));

    let outcome = std::panic::AssertUnwindSafe(workflow.run(input, handle.clone(), tools))
        .catch_unwind()
        .await;

    let terminal = match outcome {
        Ok(Ok(result)) => {
            if ctx.cancelled.load(Ordering::SeqCst) {
                finish_cancelled(ctx)
            } else {
                finish_complete(ctx, &handle, result)
            }
        }
        Ok(Err(WorkflowError::Cancelled)) => finish_cancelled(ctx),
        Ok(Err(e)) => finish_failed(ctx, e.to_string()),
        Err(panic) => {
            let message = panic_message(panic);
            tracing::error!(job = %ctx.id, error = %message, "workflow panicked");
            finish_failed(ctx, format!("workflow panicked: {message}"))
        }
    };
    if let Some(status) = terminal {
        ctx.emit_status(status);
    }
}

fn finish_complete(ctx: &ExecutionContext, handle: &JobHandle, result: Value) -> Option<JobStatus> {
    match ctx.jobs.complete(&ctx.id, result) {
        Ok(()) => {
            let _ = handle.log("Workflow complete");
            Some(JobStatus::Complete)
        }
        // An external cancel won the race; its transition stands.
        Err(JobStoreError::InvalidTransition { .. }) => None,
        Err(e) => {
            tracing::error!(job = %ctx.id, error = %e, "failed to record completion");
            None
        }
    }
}

fn finish_failed(ctx: &ExecutionContext, error: String) -> Option<JobStatus> {
    let _ = ctx.jobs.append_log(&ctx.id, format!("ERROR: {error}"));
    match ctx
        .jobs
        .set_status(&ctx.id, JobStatus::Failed, Some(error.clone()))
    {
        Ok(()) => {
            tracing::warn!(job = %ctx.id, error = %error, "job failed");
            Some(JobStatus::Failed)
        }
        Err(JobStoreError::InvalidTransition { .. }) => None,
        Err(e) => {
            tracing::error!(job = %ctx.id, error = %e, "failed to record failure");
            None
        }
    }
}

fn finish_cancelled(ctx: &ExecutionContext) -> Option<JobStatus> {
    // The cancel request usually flipped the status already; this covers a
    // workflow observing the flag before the status change landed.
    match ctx.jobs.set_status(&ctx.id, JobStatus::Cancelled, None) {
        Ok(()) => Some(JobStatus::Cancelled),
        Err(_) => None,
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
