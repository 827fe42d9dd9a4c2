//! Seam between the session layer and the collaborator service.
//!
//! [`ArtifactSource`] abstracts the two pull operations the progress
//! tracker needs: fetching the artifact after completion and pulling a
//! job snapshot when the push channel cannot deliver. The HTTP client
//! implements it for production; tests substitute scripted sources.

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::status::JobStatus;
use crate::types::JobId;

/// Outcome of an artifact fetch.
///
/// `NotReady` is a valid, non-error outcome: the pipeline may report
/// completion slightly before the artifact is durably queryable, and a
/// fetch in that window must not be treated as a failure.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Ready(Artifact),
    NotReady,
}

/// Point-in-time view of a job, pulled from the service.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub percent: u8,
    pub current_step: String,
}

/// Errors from an [`ArtifactSource`] backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The request never produced a usable response (network, DNS,
    /// TLS, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with an error status.
    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },
}

/// Pull-side operations against the generation service.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Fetch the artifact for a job, distinguishing "not yet
    /// queryable" from real errors.
    async fn fetch_artifact(&self, job_id: &str) -> Result<FetchOutcome, SourceError>;

    /// Pull the current status of a job. Used as the fallback check
    /// when live updates are unavailable.
    async fn job_snapshot(&self, job_id: &str) -> Result<JobSnapshot, SourceError>;
}
