//! Durable persistence for named output blobs, scoped per job.
//!
//! Artifacts are the only state that survives a process restart. Each job
//! gets its own directory under the store root, and the [`ArtifactRef`]
//! handed back carries a job-relative path so the root can move without
//! invalidating references.
//!
//! Filename validation is a security invariant, not a convenience: a name
//! that could escape the job's directory is rejected outright, never
//! normalized into something "safe".

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::job::ArtifactRef;
use crate::types::{ArtifactKind, JobId};

/// Environment variable overriding the artifact root directory.
pub const OUTPUT_DIR_ENV: &str = "JOBMILL_OUTPUT_DIR";

const DEFAULT_OUTPUT_DIR: &str = "./outputs";

/// Errors surfaced by artifact store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ArtifactError {
    /// No artifact stored under this job/filename pair.
    #[error("artifact not found: {job_id}/{filename}")]
    #[diagnostic(code(jobmill::artifacts::not_found))]
    NotFound { job_id: JobId, filename: String },

    /// The filename could escape the job's namespace or is not a plain name.
    #[error("invalid artifact name: {filename:?}")]
    #[diagnostic(
        code(jobmill::artifacts::invalid_name),
        help("Artifact names must be a single path component: no separators, no `..`, not empty.")
    )]
    InvalidName { filename: String },

    /// Underlying filesystem failure.
    #[error("artifact I/O error for {path}: {source}")]
    #[diagnostic(code(jobmill::artifacts::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Filesystem-backed artifact storage under a job-scoped namespace.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store rooted at `$JOBMILL_OUTPUT_DIR`, defaulting to
    /// `./outputs`.
    #[must_use]
    pub fn from_env() -> Self {
        let root = std::env::var(OUTPUT_DIR_ENV).unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string());
        Self::new(root)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist raw bytes under `<root>/<job_id>/<filename>` and return a
    /// stable reference. The label doubles as the human-readable name shown
    /// to clients.
    #[instrument(skip(self, content, label), err)]
    pub fn save(
        &self,
        job_id: &JobId,
        filename: &str,
        content: &[u8],
        kind: ArtifactKind,
        label: impl Into<String>,
    ) -> Result<ArtifactRef, ArtifactError> {
        validate_name(filename)?;
        let dir = self.root.join(job_id.as_str());
        fs::create_dir_all(&dir).map_err(|source| ArtifactError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = dir.join(filename);
        fs::write(&path, content).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(job = %job_id, filename, bytes = content.len(), "artifact saved");
        Ok(ArtifactRef::new(
            kind,
            label,
            format!("{}/{}", job_id.as_str(), filename),
        ))
    }

    /// Persist a UTF-8 text artifact.
    pub fn save_text(
        &self,
        job_id: &JobId,
        filename: &str,
        text: &str,
        label: impl Into<String>,
    ) -> Result<ArtifactRef, ArtifactError> {
        self.save(job_id, filename, text.as_bytes(), ArtifactKind::Text, label)
    }

    /// Persist a pretty-printed JSON artifact.
    pub fn save_json(
        &self,
        job_id: &JobId,
        filename: &str,
        value: &Value,
        label: impl Into<String>,
    ) -> Result<ArtifactRef, ArtifactError> {
        // Serialization of a Value cannot fail; fall back to the compact form
        // if the pretty printer ever does.
        let rendered =
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.save(
            job_id,
            filename,
            rendered.as_bytes(),
            ArtifactKind::Json,
            label,
        )
    }

    /// Read back an artifact's raw bytes.
    #[instrument(skip(self), err)]
    pub fn load(&self, job_id: &JobId, filename: &str) -> Result<Vec<u8>, ArtifactError> {
        validate_name(filename)?;
        let path = self.root.join(job_id.as_str()).join(filename);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ArtifactError::NotFound {
                job_id: job_id.clone(),
                filename: filename.to_string(),
            }),
            Err(source) => Err(ArtifactError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

/// Reject any filename that is not a single, plain path component.
fn validate_name(filename: &str) -> Result<(), ArtifactError> {
    let invalid = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains('\0');
    if invalid {
        return Err(ArtifactError::InvalidName {
            filename: filename.to_string(),
        });
    }
    Ok(())
}
