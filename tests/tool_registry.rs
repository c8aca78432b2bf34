mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use jobmill::handle::JobHandle;
use jobmill::tools::ToolRegistry;
use jobmill::types::JobStatus;
use jobmill::workflow::{Workflow, WorkflowError};
use serde_json::{Value, json};

/// Tries the unreliable tool first and falls back to echo on failure.
struct ResilientWorkflow;

#[async_trait]
impl Workflow for ResilientWorkflow {
    async fn run(
        &self,
        _input: Value,
        handle: JobHandle,
        tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError> {
        match tools.invoke("flaky_fetch", json!({})).await {
            Ok(page) => Ok(page),
            Err(e) => {
                handle.log(format!("fetch failed: {e}"))?;
                Ok(tools.invoke("echo", json!({"fallback": true})).await?)
            }
        }
    }
}

/// Propagates the first tool failure with `?`.
struct BrittleWorkflow;

#[async_trait]
impl Workflow for BrittleWorkflow {
    async fn run(
        &self,
        _input: Value,
        _handle: JobHandle,
        tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError> {
        Ok(tools.invoke("nonexistent_tool", json!({})).await?)
    }
}

#[tokio::test]
async fn workflow_can_catch_a_tool_failure_and_continue() {
    let tools = ToolRegistry::new()
        .with_tool(FlakyFetchTool)
        .with_tool(EchoTool);
    let h = harness_with_tools(tools);

    let id = h.runner.submit("fetcher", Arc::new(ResilientWorkflow), json!({}));
    assert_eq!(wait_for_terminal(&h.jobs, &id).await, JobStatus::Complete);

    let job = h.jobs.get(&id).unwrap();
    assert_eq!(job.result, Some(json!({"fallback": true})));
    let caught = job
        .logs
        .iter()
        .find(|l| l.line.starts_with("fetch failed:"))
        .expect("the caught failure should be logged");
    // The wrapped error names the tool and preserves the cause.
    assert!(caught.line.contains("flaky_fetch"), "log was: {}", caught.line);
    assert!(
        caught.line.contains("connection reset by peer"),
        "log was: {}",
        caught.line
    );
}

#[tokio::test]
async fn propagated_unknown_tool_fails_the_job() {
    let h = harness_with_tools(ToolRegistry::new().with_tool(EchoTool));

    let id = h.runner.submit("fetcher", Arc::new(BrittleWorkflow), json!({}));
    assert_eq!(wait_for_terminal(&h.jobs, &id).await, JobStatus::Failed);

    let job = h.jobs.get(&id).unwrap();
    let error = job.error.expect("tool failure should be recorded");
    assert!(error.contains("nonexistent_tool"), "error was: {error}");
}
