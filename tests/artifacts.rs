mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use jobmill::handle::JobHandle;
use jobmill::tools::ToolRegistry;
use jobmill::types::{ArtifactKind, JobStatus};
use jobmill::workflow::{Workflow, WorkflowError};
use serde_json::{Value, json};

/// Writes one text and one JSON artifact, the way a content-generator
/// mini-app would.
struct ArtifactWorkflow;

#[async_trait]
impl Workflow for ArtifactWorkflow {
    async fn run(
        &self,
        _input: Value,
        handle: JobHandle,
        _tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError> {
        handle.save_text_artifact("ad.txt", "Bright flat in Gracia", "Generated ad")?;
        handle.save_json_artifact("listing.json", &json!({"rooms": 3}), "Extracted data")?;
        Ok(json!({"artifacts": 2}))
    }
}

#[tokio::test]
async fn workflow_artifacts_land_on_disk_and_on_the_job_record() {
    let h = harness();
    let id = h.runner.submit("ad_writer", Arc::new(ArtifactWorkflow), json!({}));
    assert_eq!(wait_for_terminal(&h.jobs, &id).await, JobStatus::Complete);

    let job = h.jobs.get(&id).unwrap();
    assert_eq!(job.artifacts.len(), 2);
    assert_eq!(job.artifacts[0].kind, ArtifactKind::Text);
    assert_eq!(job.artifacts[0].label, "Generated ad");
    assert_eq!(job.artifacts[0].path, format!("{id}/ad.txt"));
    assert_eq!(job.artifacts[1].kind, ArtifactKind::Json);

    let text = h.artifacts.load(&id, "ad.txt").unwrap();
    assert_eq!(text, b"Bright flat in Gracia");
    let parsed: Value =
        serde_json::from_slice(&h.artifacts.load(&id, "listing.json").unwrap()).unwrap();
    assert_eq!(parsed, json!({"rooms": 3}));
}

/// A traversal-style filename fails the save, and the workflow propagating
/// that error fails the job without writing anything.
struct EscapingWorkflow;

#[async_trait]
impl Workflow for EscapingWorkflow {
    async fn run(
        &self,
        _input: Value,
        handle: JobHandle,
        _tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError> {
        handle.save_text_artifact("../escape.txt", "nope", "Escape attempt")?;
        Ok(json!(null))
    }
}

#[tokio::test]
async fn traversal_filenames_fail_the_save_and_record_nothing() {
    let h = harness();
    let id = h.runner.submit("ad_writer", Arc::new(EscapingWorkflow), json!({}));
    assert_eq!(wait_for_terminal(&h.jobs, &id).await, JobStatus::Failed);

    let job = h.jobs.get(&id).unwrap();
    assert!(job.artifacts.is_empty());
    let error = job.error.expect("the invalid name should be the failure");
    assert!(error.contains("invalid artifact name"), "error was: {error}");
    assert!(!h.artifacts.root().join("escape.txt").exists());
    assert!(!h.artifacts.root().parent().unwrap().join("escape.txt").exists());
}
