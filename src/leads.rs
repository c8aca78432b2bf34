//! Per-job lead tables: produced incrementally by scrape-style workflows,
//! curated concurrently by clients.
//!
//! Field ownership is split in two: the producer writes `source`, `url`,
//! `parsed_data`, `contact_*`, and `confidence` exactly once at insertion;
//! the client owns `status` and `notes` from then on. The two writer
//! categories never overlap, so concurrent production and curation cannot
//! clobber each other, and readers always get whole-record snapshots.
//!
//! Insertion is gated on the owning job being non-terminal; curation is
//! allowed at any time, including long after the job finished.

use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::store::{JobStore, JobStoreError};
use crate::types::{JobId, JobStatus, LeadId, LeadStatus};

/// Errors surfaced by lead store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum LeadError {
    /// The owning job does not exist.
    #[error("job not found: {id}")]
    #[diagnostic(code(jobmill::leads::job_not_found))]
    JobNotFound { id: JobId },

    /// No lead with this id in the job's lead set.
    #[error("lead {lead_id} not found in job {job_id}")]
    #[diagnostic(code(jobmill::leads::lead_not_found))]
    LeadNotFound { job_id: JobId, lead_id: LeadId },

    /// Producer-side insertion after the owning job reached a terminal state.
    #[error("job {id} is closed for writes (status: {status})")]
    #[diagnostic(
        code(jobmill::leads::job_closed),
        help("Leads can only be inserted while the owning job is pending or running.")
    )]
    JobClosedForWrites { id: JobId, status: JobStatus },

    /// Client attempted to mutate a producer-owned field.
    #[error("field is not client-writable: {field}")]
    #[diagnostic(
        code(jobmill::leads::immutable_field),
        help("Only `status` and `notes` may be updated after insertion.")
    )]
    ImmutableField { field: String },

    /// `status` carried a value outside the lead lifecycle vocabulary.
    #[error("unknown lead status: {value}")]
    #[diagnostic(code(jobmill::leads::bad_status))]
    BadStatus { value: String },
}

/// Producer-supplied fields of a lead, written once at insertion.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LeadDraft {
    pub source: String,
    pub url: String,
    pub parsed_data: Value,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub confidence: f64,
}

/// A structured record produced by a scrape-style workflow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub job_id: JobId,
    pub source: String,
    pub url: String,
    pub parsed_data: Value,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub confidence: f64,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    fn from_draft(id: LeadId, job_id: JobId, draft: LeadDraft) -> Self {
        Self {
            id,
            job_id,
            source: draft.source,
            url: draft.url,
            parsed_data: draft.parsed_data,
            contact_name: draft.contact_name,
            contact_phone: draft.contact_phone,
            confidence: draft.confidence,
            status: LeadStatus::New,
            notes: None,
            created_at: Utc::now(),
        }
    }
}

/// Partial update restricted to the client-writable field group.
#[derive(Clone, Debug, Default)]
pub struct LeadPatch {
    pub status: Option<LeadStatus>,
    pub notes: Option<String>,
}

impl LeadPatch {
    #[must_use]
    pub fn status(status: LeadStatus) -> Self {
        Self {
            status: Some(status),
            notes: None,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Build a patch from a client-supplied JSON object.
    ///
    /// Any key outside `{status, notes}` is rejected with
    /// [`LeadError::ImmutableField`] rather than ignored, so a client that
    /// tries to rewrite `confidence` or `contact_phone` gets a hard error
    /// instead of a silent no-op.
    pub fn from_value(value: &Value) -> Result<Self, LeadError> {
        let Some(map) = value.as_object() else {
            return Err(LeadError::ImmutableField {
                field: "<non-object patch>".to_string(),
            });
        };
        let mut patch = LeadPatch::default();
        for (key, val) in map {
            match key.as_str() {
                "status" => {
                    let raw = val.as_str().unwrap_or_default();
                    patch.status = Some(LeadStatus::parse(raw).ok_or_else(|| {
                        LeadError::BadStatus {
                            value: raw.to_string(),
                        }
                    })?);
                }
                "notes" => {
                    patch.notes = val.as_str().map(str::to_string);
                }
                other => {
                    return Err(LeadError::ImmutableField {
                        field: other.to_string(),
                    });
                }
            }
        }
        Ok(patch)
    }
}

#[derive(Default)]
struct LeadTable {
    next_id: LeadId,
    rows: Vec<Lead>,
}

/// Thread-safe lead tables, one per job, with per-job locking.
///
/// Holds the job store only to check owner liveness on insertion; it never
/// mutates job state.
pub struct LeadStore {
    jobs: Arc<JobStore>,
    tables: RwLock<FxHashMap<JobId, Arc<Mutex<LeadTable>>>>,
}

impl LeadStore {
    #[must_use]
    pub fn new(jobs: Arc<JobStore>) -> Self {
        Self {
            jobs,
            tables: RwLock::new(FxHashMap::default()),
        }
    }

    /// Insert a lead for a non-terminal job, returning the stored record
    /// with its fresh id.
    #[instrument(skip(self, draft), err)]
    pub fn add(&self, job_id: &JobId, draft: LeadDraft) -> Result<Lead, LeadError> {
        let status = self.owner_status(job_id)?;
        if status.is_terminal() {
            return Err(LeadError::JobClosedForWrites {
                id: job_id.clone(),
                status,
            });
        }
        let table = self.table(job_id);
        let mut table = table.lock().expect("lead table lock poisoned");
        table.next_id += 1;
        let lead = Lead::from_draft(table.next_id, job_id.clone(), draft);
        table.rows.push(lead.clone());
        tracing::debug!(job = %job_id, lead = lead.id, "lead inserted");
        Ok(lead)
    }

    /// Snapshot all leads for a job in insertion order.
    ///
    /// Safe to call while a workflow is still inserting; the returned vector
    /// is a point-in-time copy.
    pub fn list(&self, job_id: &JobId) -> Result<Vec<Lead>, LeadError> {
        self.owner_status(job_id)?;
        let table = self.table(job_id);
        let table = table.lock().expect("lead table lock poisoned");
        Ok(table.rows.clone())
    }

    /// Apply a client patch to one lead, regardless of the owning job's
    /// status, and return the updated record.
    #[instrument(skip(self, patch), err)]
    pub fn update(
        &self,
        job_id: &JobId,
        lead_id: LeadId,
        patch: LeadPatch,
    ) -> Result<Lead, LeadError> {
        self.owner_status(job_id)?;
        let table = self.table(job_id);
        let mut table = table.lock().expect("lead table lock poisoned");
        let lead = table
            .rows
            .iter_mut()
            .find(|l| l.id == lead_id)
            .ok_or_else(|| LeadError::LeadNotFound {
                job_id: job_id.clone(),
                lead_id,
            })?;
        if let Some(status) = patch.status {
            lead.status = status;
        }
        if let Some(notes) = patch.notes {
            lead.notes = Some(notes);
        }
        Ok(lead.clone())
    }

    /// Drop a job's lead table (used together with job eviction).
    pub fn delete_table(&self, job_id: &JobId) -> bool {
        self.tables
            .write()
            .expect("lead map lock poisoned")
            .remove(job_id)
            .is_some()
    }

    /// Drop every lead table whose owning job no longer exists, returning
    /// how many were dropped. Used after bulk job eviction.
    pub fn prune_orphans(&self) -> usize {
        let mut tables = self.tables.write().expect("lead map lock poisoned");
        let before = tables.len();
        tables.retain(|job_id, _| self.jobs.status(job_id).is_ok());
        before - tables.len()
    }

    fn owner_status(&self, job_id: &JobId) -> Result<JobStatus, LeadError> {
        self.jobs.status(job_id).map_err(|e| match e {
            JobStoreError::JobNotFound { id } => LeadError::JobNotFound { id },
            // status() only fails on lookup; transitions are not involved.
            JobStoreError::InvalidTransition { .. } => LeadError::JobNotFound {
                id: job_id.clone(),
            },
        })
    }

    fn table(&self, job_id: &JobId) -> Arc<Mutex<LeadTable>> {
        if let Some(table) = self
            .tables
            .read()
            .expect("lead map lock poisoned")
            .get(job_id)
        {
            return table.clone();
        }
        self.tables
            .write()
            .expect("lead map lock poisoned")
            .entry(job_id.clone())
            .or_default()
            .clone()
    }
}
