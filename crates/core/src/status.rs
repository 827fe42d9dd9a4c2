//! Job status as reported by the generation service.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a generation job.
///
/// The pipeline advances `Pending → Initializing → Researching →
/// Analyzing → Generating → Completed`, with `Failed` reachable from
/// any non-terminal state. The server is authoritative; the client
/// adopts whatever it reports but never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Initializing,
    Researching,
    Analyzing,
    Generating,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether this status is absorbing (`Completed` or `Failed`).
    ///
    /// Once a terminal status is adopted, no further transition is
    /// accepted for that job, even if stray late messages arrive.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Initializing => "initializing",
            JobStatus::Researching => "researching",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Researching).unwrap();
        assert_eq!(json, r#""researching""#);
    }

    #[test]
    fn deserializes_lowercase() {
        let status: JobStatus = serde_json::from_str(r#""completed""#).unwrap();
        assert_eq!(status, JobStatus::Completed);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        for status in [
            JobStatus::Pending,
            JobStatus::Initializing,
            JobStatus::Researching,
            JobStatus::Analyzing,
            JobStatus::Generating,
        ] {
            assert!(!status.is_terminal(), "{status} should not be terminal");
        }
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(JobStatus::Generating.to_string(), "generating");
        let json = serde_json::to_string(&JobStatus::Generating).unwrap();
        assert_eq!(json, format!("\"{}\"", JobStatus::Generating));
    }
}
