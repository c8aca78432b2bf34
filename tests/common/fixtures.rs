use std::sync::Arc;
use std::time::Duration;

use jobmill::artifacts::ArtifactStore;
use jobmill::events::{EventBus, MemorySink};
use jobmill::leads::LeadStore;
use jobmill::runner::JobRunner;
use jobmill::store::JobStore;
use jobmill::tools::ToolRegistry;
use jobmill::types::{JobId, JobStatus};
use tempfile::TempDir;

/// Fully wired runner with a memory sink and tempdir-backed artifacts.
pub struct Harness {
    pub runner: JobRunner,
    pub jobs: Arc<JobStore>,
    pub leads: Arc<LeadStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub sink: MemorySink,
    _outputs: TempDir,
}

pub fn harness() -> Harness {
    harness_with_tools(ToolRegistry::new())
}

pub fn harness_with_tools(tools: ToolRegistry) -> Harness {
    let jobs = Arc::new(JobStore::new());
    let leads = Arc::new(LeadStore::new(jobs.clone()));
    let outputs = TempDir::new().expect("tempdir");
    let artifacts = Arc::new(ArtifactStore::new(outputs.path()));
    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    let runner = JobRunner::with_bus(
        jobs.clone(),
        leads.clone(),
        artifacts.clone(),
        Arc::new(tools),
        bus,
        true,
    );
    Harness {
        runner,
        jobs,
        leads,
        artifacts,
        sink,
        _outputs: outputs,
    }
}

/// Poll until the predicate holds, with a generous deadline.
pub async fn wait_for(
    jobs: &JobStore,
    id: &JobId,
    pred: impl Fn(JobStatus) -> bool,
) -> JobStatus {
    for _ in 0..1000 {
        let status = jobs.status(id).expect("job should exist while polling");
        if pred(status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} did not reach the expected state in time");
}

pub async fn wait_for_terminal(jobs: &JobStore, id: &JobId) -> JobStatus {
    wait_for(jobs, id, JobStatus::is_terminal).await
}

/// Poll an arbitrary condition until it yields a value, with a deadline.
pub async fn poll_until<T>(mut check: impl FnMut() -> Option<T>) -> T {
    for _ in 0..1000 {
        if let Some(value) = check() {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition was not met in time");
}
