//! The workflow seam: the trait mini-apps implement and the error type that
//! flows out of a workflow body.
//!
//! A workflow is plain business logic. It receives the restricted
//! [`JobHandle`] and the [`ToolRegistry`] and drives its mini-app's pipeline;
//! it never touches store internals, and the runner guarantees that however
//! the body exits (return, error, panic) the job lands in exactly one
//! terminal state.

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::artifacts::ArtifactError;
use crate::handle::JobHandle;
use crate::leads::LeadError;
use crate::store::JobStoreError;
use crate::tools::{ToolError, ToolRegistry};

/// Business logic supplied by a mini-app, driven by the job runner.
///
/// # Error Handling
///
/// Returning `Err` fails the job with the error's message recorded; a tool
/// failure caught inside the body (`match tools.invoke(..)`) does not fail
/// the job; the workflow decides whether to retry, substitute, or abort.
/// Returning [`WorkflowError::Cancelled`] (typically via
/// [`JobHandle::check_cancelled`]) ends the job as cancelled, not failed.
///
/// # Example
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use jobmill::handle::JobHandle;
/// use jobmill::tools::ToolRegistry;
/// use jobmill::workflow::{Workflow, WorkflowError};
/// use serde_json::{Value, json};
/// use std::sync::Arc;
///
/// struct AdCopyWorkflow;
///
/// #[async_trait]
/// impl Workflow for AdCopyWorkflow {
///     async fn run(
///         &self,
///         input: Value,
///         handle: JobHandle,
///         tools: Arc<ToolRegistry>,
///     ) -> Result<Value, WorkflowError> {
///         let url = input["url"]
///             .as_str()
///             .ok_or(WorkflowError::MissingInput { what: "url" })?;
///         handle.log(format!("Scraping {url}"))?;
///         handle.check_cancelled()?;
///         let page = tools.invoke("scrape", json!({"url": url})).await?;
///         handle.log("Generating ad copy")?;
///         let ad = tools.invoke("llm_generate", page).await?;
///         Ok(json!({"ad": ad}))
///     }
/// }
/// ```
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Execute the workflow for one job.
    async fn run(
        &self,
        input: Value,
        handle: JobHandle,
        tools: Arc<ToolRegistry>,
    ) -> Result<Value, WorkflowError>;
}

/// Errors a workflow body can produce or propagate.
///
/// Every variant except [`Cancelled`](Self::Cancelled) terminates the job as
/// `failed` with the rendered message captured in the job's `error` field.
#[derive(Debug, Error, Diagnostic)]
pub enum WorkflowError {
    /// Expected input data is missing from the submission payload.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(jobmill::workflow::missing_input),
        help("Check the submission payload for the required field.")
    )]
    MissingInput { what: &'static str },

    /// A tool invocation failed and the workflow chose to propagate it.
    #[error(transparent)]
    #[diagnostic(code(jobmill::workflow::tool))]
    Tool(#[from] ToolError),

    /// Cooperative cancellation observed; ends the job as cancelled.
    #[error("job cancelled")]
    #[diagnostic(code(jobmill::workflow::cancelled))]
    Cancelled,

    /// Job store rejected a handle operation (e.g. the job was evicted).
    #[error(transparent)]
    #[diagnostic(code(jobmill::workflow::store))]
    Store(#[from] JobStoreError),

    /// Lead store rejected an insertion.
    #[error(transparent)]
    #[diagnostic(code(jobmill::workflow::lead))]
    Lead(#[from] LeadError),

    /// Artifact persistence failed.
    #[error(transparent)]
    #[diagnostic(code(jobmill::workflow::artifact))]
    Artifact(#[from] ArtifactError),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(jobmill::workflow::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Free-form failure raised by workflow logic.
    #[error("{0}")]
    #[diagnostic(code(jobmill::workflow::message))]
    Message(String),
}

impl WorkflowError {
    /// Build a free-form workflow failure.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
