//! Artifact models for the generated result.
//!
//! Artifacts are produced and stored by the external pipeline; the
//! client only fetches, edits, lists and deletes them by job id.

use serde::{Deserialize, Serialize};

use crate::request::OutputFormat;
use crate::status::JobStatus;
use crate::types::{JobId, Timestamp};

/// The final generated output of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub job_id: JobId,
    pub title: String,
    /// Rendered content (markdown).
    pub content: String,
    /// Generation metadata (agent contributions, timing, etc.). Opaque
    /// to this client.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Source references cited by the research agents.
    #[serde(default)]
    pub sources: Vec<String>,
    pub created_at: Timestamp,
    pub output_format: OutputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update for an artifact. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Filter parameters for listing artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactFilter {
    /// Free-text search over title and topic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Restrict to jobs in a specific status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ArtifactFilter {
    fn default() -> Self {
        Self {
            query: None,
            status: None,
            page: 1,
            page_size: 20,
        }
    }
}

/// One row in an artifact listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub job_id: JobId,
    pub title: String,
    pub status: JobStatus,
    pub created_at: Timestamp,
}

/// A single page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}
