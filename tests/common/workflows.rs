use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobmill::handle::JobHandle;
use jobmill::leads::LeadDraft;
use jobmill::tools::{BoxError, Tool, ToolRegistry};
use jobmill::workflow::{Workflow, WorkflowError};
use serde_json::{Value, json};
use tokio::sync::Notify;

/// Logs each step line, then returns the fixed result.
pub struct ScriptedWorkflow {
    pub steps: Vec<String>,
    pub result: Value,
}

impl ScriptedWorkflow {
    pub fn new(steps: &[&str], result: Value) -> Self {
        Self {
            steps: steps.iter().map(|s| (*s).to_string()).collect(),
            result,
        }
    }
}

#[async_trait]
impl Workflow for ScriptedWorkflow {
    async fn run(
        &self,
        _input: Value,
        handle: JobHandle,
        _tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError> {
        for step in &self.steps {
            handle.log(step.clone())?;
        }
        Ok(self.result.clone())
    }
}

/// Logs a few steps, then fails with the given message.
pub struct FailingWorkflow {
    pub logs_before_failure: usize,
    pub message: String,
}

#[async_trait]
impl Workflow for FailingWorkflow {
    async fn run(
        &self,
        _input: Value,
        handle: JobHandle,
        _tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError> {
        for i in 0..self.logs_before_failure {
            handle.log(format!("step {}", i + 1))?;
        }
        Err(WorkflowError::msg(self.message.clone()))
    }
}

/// Panics mid-flight instead of returning an error.
pub struct PanickingWorkflow;

#[async_trait]
impl Workflow for PanickingWorkflow {
    async fn run(
        &self,
        _input: Value,
        _handle: JobHandle,
        _tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError> {
        panic!("scrape buffer overrun")
    }
}

/// Spins until cancellation is requested, polling the cooperative flag.
///
/// Bounded so a test that forgets to cancel fails instead of hanging.
pub struct WaitForCancelWorkflow;

#[async_trait]
impl Workflow for WaitForCancelWorkflow {
    async fn run(
        &self,
        _input: Value,
        handle: JobHandle,
        _tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError> {
        for _ in 0..2000 {
            handle.check_cancelled()?;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(json!({"waited_out": true}))
    }
}

/// Inserts one lead per url, then parks on the gate until the test releases
/// it. Lets tests mutate leads while the job is demonstrably still running.
pub struct GatedLeadWorkflow {
    pub urls: Vec<String>,
    pub gate: Arc<Notify>,
}

#[async_trait]
impl Workflow for GatedLeadWorkflow {
    async fn run(
        &self,
        _input: Value,
        handle: JobHandle,
        _tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError> {
        for url in &self.urls {
            handle.add_lead(LeadDraft {
                source: "idealista".to_string(),
                url: url.clone(),
                parsed_data: json!({"title": "Piso luminoso"}),
                contact_name: None,
                contact_phone: Some("+34 600 111 222".to_string()),
                confidence: 0.8,
            })?;
        }
        self.gate.notified().await;
        Ok(json!({"leads": self.urls.len()}))
    }
}

/// Tool that always fails, for exercising failure wrapping.
pub struct FlakyFetchTool;

#[async_trait]
impl Tool for FlakyFetchTool {
    fn name(&self) -> &str {
        "flaky_fetch"
    }

    fn description(&self) -> &str {
        "fetches a page, unreliably"
    }

    async fn execute(&self, _args: Value) -> Result<Value, BoxError> {
        Err("connection reset by peer".into())
    }
}

/// Tool that echoes its arguments back.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "returns its arguments unchanged"
    }

    async fn execute(&self, args: Value) -> Result<Value, BoxError> {
        Ok(args)
    }
}
