//! Progress updates pushed by the generation service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::status::JobStatus;
use crate::types::{JobId, Timestamp};

/// One progress update for a running job.
///
/// Sent by the server as a JSON text frame on the per-job channel.
/// The client keeps only the latest event; there is no history buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The job this update belongs to.
    pub job_id: JobId,
    /// Server-side pipeline status.
    pub status: JobStatus,
    /// Completion percentage, 0–100 inclusive.
    pub percent: u8,
    /// Free-text label for the step currently running.
    pub current_step: String,
    /// Server estimate of when the job will finish, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<Timestamp>,
    /// Per-agent free-text activity, keyed by agent name.
    #[serde(default)]
    pub agent_activity: HashMap<String, String>,
}
