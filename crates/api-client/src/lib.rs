//! REST client for the generation service's HTTP endpoints.
//!
//! Wraps job submission, status pulls, and the artifact store
//! operations (fetch, edit, list, delete) using [`reqwest`]. The
//! generation pipeline and the store behind these endpoints are
//! external collaborators; this client only speaks their contract.

use async_trait::async_trait;
use serde::Deserialize;
use validator::Validate;

use tempest_core::{
    Artifact, ArtifactFilter, ArtifactPatch, ArtifactSource, ArtifactSummary, FetchOutcome,
    GenerationRequest, JobId, JobSnapshot, JobStatus, Page, SourceError,
};

/// HTTP client for one generation service.
pub struct ResearchApi {
    client: reqwest::Client,
    base_url: String,
}

/// Response returned after successfully queuing a job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobAccepted {
    /// Server-assigned job identifier; keys the progress channel and
    /// the artifact lookup.
    pub job_id: JobId,
    pub initial_status: JobStatus,
    /// Human-readable acknowledgement from the service.
    #[serde(default)]
    pub message: Option<String>,
}

/// Errors from the generation service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request failed client-side validation and was never sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ResearchApi {
    /// Create a new API client.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://host:8000`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Base HTTP URL of the service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a generation job.
    ///
    /// Validates the request client-side, then sends
    /// `POST /research/start`. Returns the server-assigned job id and
    /// its initial status.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<JobAccepted, ApiError> {
        request
            .validate()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/research/start", self.base_url))
            .json(request)
            .send()
            .await?;

        let accepted: JobAccepted = Self::parse_response(response).await?;
        tracing::info!(
            job_id = %accepted.job_id,
            initial_status = %accepted.initial_status,
            "Job submitted",
        );
        Ok(accepted)
    }

    /// Pull the current status of a job.
    ///
    /// Sends `GET /research/{job_id}/status`. Used as the fallback
    /// check when the push channel cannot deliver.
    pub async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, ApiError> {
        let response = self
            .client
            .get(format!("{}/research/{}/status", self.base_url, job_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the artifact for a job.
    ///
    /// Sends `GET /research/{job_id}/result`. A `400` (job not
    /// completed yet) or `404` (result not yet queryable — the service
    /// may notify completion before the artifact is durably written)
    /// maps to [`FetchOutcome::NotReady`]; both are valid non-error
    /// outcomes immediately after completion.
    pub async fn fetch_artifact(&self, job_id: &str) -> Result<FetchOutcome, ApiError> {
        let response = self
            .client
            .get(format!("{}/research/{}/result", self.base_url, job_id))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 400 || status == 404 {
            tracing::debug!(job_id = %job_id, status, "Artifact not ready yet");
            return Ok(FetchOutcome::NotReady);
        }

        let response = Self::ensure_success(response).await?;
        Ok(FetchOutcome::Ready(response.json::<Artifact>().await?))
    }

    /// Apply a partial edit to a stored artifact.
    ///
    /// Sends `PATCH /research/{job_id}/result` and returns the updated
    /// artifact.
    pub async fn update_artifact(
        &self,
        job_id: &str,
        patch: &ArtifactPatch,
    ) -> Result<Artifact, ApiError> {
        let response = self
            .client
            .patch(format!("{}/research/{}/result", self.base_url, job_id))
            .json(patch)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// List stored artifacts, filtered and paginated.
    ///
    /// Sends `GET /research/sessions` with the filter as query
    /// parameters.
    pub async fn list_artifacts(
        &self,
        filter: &ArtifactFilter,
    ) -> Result<Page<ArtifactSummary>, ApiError> {
        let response = self
            .client
            .get(format!("{}/research/sessions", self.base_url))
            .query(filter)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Delete a job and its artifact.
    ///
    /// Sends `DELETE /research/{job_id}`.
    pub async fn delete_job(&self, job_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(format!("{}/research/{}", self.base_url, job_id))
            .send()
            .await?;

        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

impl From<ApiError> for SourceError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Api { status, body } => SourceError::Service {
                status,
                message: body,
            },
            other => SourceError::Transport(other.to_string()),
        }
    }
}

#[async_trait]
impl ArtifactSource for ResearchApi {
    async fn fetch_artifact(&self, job_id: &str) -> Result<FetchOutcome, SourceError> {
        Ok(ResearchApi::fetch_artifact(self, job_id).await?)
    }

    async fn job_snapshot(&self, job_id: &str) -> Result<JobSnapshot, SourceError> {
        Ok(ResearchApi::job_status(self, job_id).await?)
    }
}
