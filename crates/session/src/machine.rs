//! Client-side mirror of a job's server status.
//!
//! The server is authoritative: incoming statuses are adopted without
//! forward-progress validation. The machine's own guarantees are the
//! ones the server cannot give — terminal states are sticky, foreign
//! job ids are filtered, and the completion/failure side effects fire
//! at most once per job.

use tempest_core::{JobId, JobStatus, ProgressEvent};

/// Side effect the caller must perform after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Event was dropped: terminal absorption or a foreign job id.
    Ignored,
    /// Status adopted; nothing else to do. Repeated same-status events
    /// with advancing percentages land here — that is normal
    /// steady-state traffic, not an error.
    None,
    /// First transition into `Completed`: fetch the artifact.
    FetchResult,
    /// First transition into `Failed`: notify the user. The job is not
    /// retried automatically.
    NotifyFailure,
}

/// Tracks one job's status across its lifetime.
#[derive(Debug)]
pub struct JobStateMachine {
    job_id: JobId,
    status: JobStatus,
    fetch_triggered: bool,
    failure_notified: bool,
}

impl JobStateMachine {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            fetch_triggered: false,
            failure_notified: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Current (latest adopted) status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Apply one incoming progress event.
    ///
    /// Once `Completed` or `Failed` has been adopted, every further
    /// event is absorbed without effect, so a duplicate terminal event
    /// can never trigger a second fetch or a second failure notice.
    pub fn apply(&mut self, event: &ProgressEvent) -> Effect {
        if event.job_id != self.job_id {
            tracing::debug!(
                job_id = %self.job_id,
                event_job_id = %event.job_id,
                "Ignoring event for a different job",
            );
            return Effect::Ignored;
        }

        if self.status.is_terminal() {
            tracing::debug!(
                job_id = %self.job_id,
                status = %self.status,
                late_status = %event.status,
                "Ignoring event after terminal status",
            );
            return Effect::Ignored;
        }

        self.status = event.status;

        match event.status {
            JobStatus::Completed if !self.fetch_triggered => {
                self.fetch_triggered = true;
                Effect::FetchResult
            }
            JobStatus::Failed if !self.failure_notified => {
                self.failure_notified = true;
                Effect::NotifyFailure
            }
            _ => Effect::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn event(job_id: &str, status: JobStatus, percent: u8) -> ProgressEvent {
        ProgressEvent {
            job_id: job_id.to_string(),
            status,
            percent,
            current_step: String::new(),
            estimated_completion: None,
            agent_activity: HashMap::new(),
        }
    }

    #[test]
    fn ordered_pipeline_fetches_exactly_once() {
        let mut machine = JobStateMachine::new("job-1".into());

        assert_eq!(machine.apply(&event("job-1", JobStatus::Pending, 0)), Effect::None);
        assert_eq!(
            machine.apply(&event("job-1", JobStatus::Researching, 40)),
            Effect::None
        );
        assert_eq!(
            machine.apply(&event("job-1", JobStatus::Generating, 90)),
            Effect::None
        );
        assert_eq!(
            machine.apply(&event("job-1", JobStatus::Completed, 100)),
            Effect::FetchResult
        );
        assert_eq!(machine.status(), JobStatus::Completed);

        // A duplicate terminal event must not trigger a second fetch.
        assert_eq!(
            machine.apply(&event("job-1", JobStatus::Completed, 100)),
            Effect::Ignored
        );
    }

    #[test]
    fn repeated_same_status_events_are_normal_traffic() {
        let mut machine = JobStateMachine::new("job-1".into());

        for percent in [10, 20, 35] {
            assert_eq!(
                machine.apply(&event("job-1", JobStatus::Researching, percent)),
                Effect::None
            );
        }
        assert_eq!(machine.status(), JobStatus::Researching);
    }

    #[test]
    fn failure_notifies_once_and_absorbs_stray_events() {
        let mut machine = JobStateMachine::new("job-1".into());

        assert_eq!(
            machine.apply(&event("job-1", JobStatus::Researching, 30)),
            Effect::None
        );
        assert_eq!(
            machine.apply(&event("job-1", JobStatus::Failed, 30)),
            Effect::NotifyFailure
        );
        assert_eq!(machine.status(), JobStatus::Failed);

        // Stray late events do not re-open the job.
        assert_eq!(
            machine.apply(&event("job-1", JobStatus::Generating, 95)),
            Effect::Ignored
        );
        assert_eq!(
            machine.apply(&event("job-1", JobStatus::Failed, 30)),
            Effect::Ignored
        );
        assert_eq!(machine.status(), JobStatus::Failed);
    }

    #[test]
    fn completed_is_sticky_against_regressions() {
        let mut machine = JobStateMachine::new("job-1".into());

        machine.apply(&event("job-1", JobStatus::Completed, 100));
        machine.apply(&event("job-1", JobStatus::Researching, 10));
        assert_eq!(machine.status(), JobStatus::Completed);
    }

    #[test]
    fn foreign_job_id_is_ignored() {
        let mut machine = JobStateMachine::new("job-1".into());

        assert_eq!(
            machine.apply(&event("job-2", JobStatus::Completed, 100)),
            Effect::Ignored
        );
        assert_eq!(machine.status(), JobStatus::Pending);
    }

    #[test]
    fn server_status_is_adopted_without_ordering_checks() {
        // The client trusts the server: a skip straight to Generating
        // is adopted as-is.
        let mut machine = JobStateMachine::new("job-1".into());

        assert_eq!(
            machine.apply(&event("job-1", JobStatus::Generating, 80)),
            Effect::None
        );
        assert_eq!(machine.status(), JobStatus::Generating);
    }
}
