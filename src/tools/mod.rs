//! Capability boundary for effectful operations.
//!
//! Workflows never perform network fetches, generation calls, or file writes
//! directly; they go through a [`Tool`] resolved by name from the
//! [`ToolRegistry`]. The registry's sole job is name resolution and error
//! wrapping, which makes the set of reachable effects auditable at process
//! start: only registered tools, never arbitrary calls, are reachable from
//! workflow or planner code.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use jobmill::tools::{BoxError, Tool, ToolRegistry};
//! use serde_json::{Value, json};
//!
//! struct EchoTool;
//!
//! #[async_trait]
//! impl Tool for EchoTool {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn description(&self) -> &str {
//!         "Returns its arguments unchanged"
//!     }
//!
//!     async fn execute(&self, args: Value) -> Result<Value, BoxError> {
//!         Ok(json!({"echo": args}))
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ToolRegistry::new();
//! registry.register(EchoTool);
//! let out = registry.invoke("echo", json!({"msg": "hi"})).await?;
//! assert_eq!(out["echo"]["msg"], "hi");
//! # Ok(())
//! # }
//! ```

mod registry;

pub use registry::{ToolInfo, ToolRegistry};

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::{Value, json};
use thiserror::Error;

/// Opaque error type tools may return; the registry wraps it with the tool
/// name before it reaches workflow code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An executable capability with a declared input/output shape.
///
/// Side effects performed inside [`execute`](Self::execute) (network I/O,
/// file I/O) are opaque to the registry. Suspension points inside tool
/// execution are the only blocking points a workflow has.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the tool is resolved by.
    fn name(&self) -> &str;

    /// Human-readable description, surfaced to planners and UIs.
    fn description(&self) -> &str;

    /// JSON Schema for the arguments object. Defaults to an open object.
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    /// JSON Schema for the result object. Defaults to an open object.
    fn output_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    /// Execute the capability.
    async fn execute(&self, args: Value) -> Result<Value, BoxError>;
}

/// Errors surfaced by tool invocation.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    /// No tool registered under this name. Checked at invoke time, not at
    /// registration time.
    #[error("tool not found: {name}")]
    #[diagnostic(
        code(jobmill::tools::not_found),
        help("Tools are registered once at process start; check the registered name.")
    )]
    NotFound { name: String },

    /// The capability itself failed; the original cause is preserved.
    #[error("tool '{name}' failed: {source}")]
    #[diagnostic(code(jobmill::tools::execution))]
    Execution {
        name: String,
        #[source]
        source: BoxError,
    },
}
