//! # Jobmill: Async Job Orchestration for Mini-App Workflows
//!
//! Jobmill runs long-lived mini-app workflows (scraping pipelines, content
//! generators) as background jobs with observable, append-only progress.
//! Clients submit a job and immediately get an id; the workflow executes on
//! its own tokio task while logs, artifacts, and leads accumulate for
//! polling or streaming.
//!
//! ## Core Concepts
//!
//! - **Jobs**: Units of workflow execution with a strict lifecycle
//!   (`pending -> running -> complete | failed | cancelled`)
//! - **Workflows**: Async business logic implementing the [`Workflow`](workflow::Workflow) trait
//! - **Tools**: Named capabilities (scrape, generate, ...) resolved by name at runtime
//! - **Artifacts**: Files produced by workflows, namespaced per job on disk
//! - **Leads**: Structured scrape results that clients can triage while the job still runs
//! - **Events**: Progress stream fanned out to pluggable sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use jobmill::artifacts::ArtifactStore;
//! use jobmill::handle::JobHandle;
//! use jobmill::leads::LeadStore;
//! use jobmill::runner::JobRunner;
//! use jobmill::store::JobStore;
//! use jobmill::tools::ToolRegistry;
//! use jobmill::workflow::{Workflow, WorkflowError};
//! use serde_json::{Value, json};
//!
//! struct HelloWorkflow;
//!
//! #[async_trait]
//! impl Workflow for HelloWorkflow {
//!     async fn run(
//!         &self,
//!         input: Value,
//!         handle: JobHandle,
//!         _tools: Arc<ToolRegistry>,
//!     ) -> Result<Value, WorkflowError> {
//!         handle.log("saying hello")?;
//!         Ok(json!({"greeting": format!("hello, {}", input["name"])}))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let jobs = Arc::new(JobStore::new());
//!     let leads = Arc::new(LeadStore::new(jobs.clone()));
//!     let artifacts = Arc::new(ArtifactStore::from_env());
//!     let tools = Arc::new(ToolRegistry::new());
//!
//!     let runner = JobRunner::new(jobs.clone(), leads, artifacts, tools);
//!     let id = runner.submit("hello", Arc::new(HelloWorkflow), json!({"name": "world"}));
//!
//!     // Poll for progress; jobs.get returns a point-in-time snapshot.
//!     let snapshot = jobs.get(&id).unwrap();
//!     println!("{}: {}", snapshot.id, snapshot.status);
//! }
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Job and lead identifiers, status enums, the transition table
//! - [`job`] - The job record, log lines, and artifact references
//! - [`store`] - Concurrency-safe in-memory job store
//! - [`leads`] - Per-job lead tables with client-side triage
//! - [`tools`] - The [`Tool`](tools::Tool) trait and name-keyed registry
//! - [`artifacts`] - Filesystem artifact persistence with name sanitation
//! - [`workflow`] - The workflow seam mini-apps implement
//! - [`handle`] - The restricted capability object workflows receive
//! - [`runner`] - Background execution, cancellation, and shutdown
//! - [`events`] - Event bus, event types, and sinks
//! - [`telemetry`] - Event formatting and tracing bootstrap

pub mod artifacts;
pub mod events;
pub mod handle;
pub mod job;
pub mod leads;
pub mod runner;
pub mod store;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod workflow;
