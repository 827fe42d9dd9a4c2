//! One job run: channel events in, run events out.
//!
//! [`JobRun`] owns the client-side lifecycle of a single submitted
//! job. It subscribes to the channel manager, feeds decoded progress
//! through the [`JobStateMachine`], performs the exactly-once artifact
//! fetch when the job completes, and falls back to a pull-based status
//! check when the push channel cannot deliver. Everything is torn down
//! by [`shutdown`](JobRun::shutdown): pending reconnects are
//! cancelled, the channel is closed deliberately, and any in-flight
//! fetch response is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;

use tempest_channel::{ChannelEvent, ChannelManager};
use tempest_core::{
    Artifact, ArtifactSource, FetchOutcome, JobId, JobSnapshot, JobStatus, ProgressEvent,
    SourceError,
};

use crate::machine::{Effect, JobStateMachine};

/// Broadcast capacity for run events.
const RUN_EVENT_CAPACITY: usize = 256;

/// How long `shutdown()` waits for the run task to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Tunables for one job run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Emit a [`RunEvent::Stalled`] notice when no progress event has
    /// arrived within this window. `None` (the default) disables the
    /// watchdog: a job that never terminates simply stays in its
    /// last-known status.
    pub stall_timeout: Option<Duration>,
}

/// Events surfaced to the owner of a job run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A progress update was adopted by the state machine.
    Progress(ProgressEvent),
    /// Reconnect attempts are exhausted. The job may still finish
    /// server-side; its status was pulled once and can be refreshed
    /// manually via [`JobRun::refresh_status`].
    LiveUpdatesUnavailable,
    /// The job completed but its artifact is not queryable yet. Not an
    /// error; re-check via [`JobRun::recheck_artifact`].
    AwaitingArtifact,
    /// The artifact was fetched; the run is over.
    Completed(Artifact),
    /// The server reported the job failed. Emitted exactly once; the
    /// job is not retried.
    Failed { message: String },
    /// Fetching the artifact failed. Recoverable and independent of
    /// the job status — the job itself still completed.
    FetchError { message: String },
    /// No progress within the configured stall window. Informational.
    Stalled,
}

/// State shared between the run task and the [`JobRun`] handle.
struct RunShared {
    job_id: JobId,
    machine: Mutex<JobStateMachine>,
    artifacts: Arc<dyn ArtifactSource>,
    event_tx: broadcast::Sender<RunEvent>,
    status_tx: watch::Sender<JobStatus>,
    cancel: CancellationToken,
}

impl RunShared {
    fn emit(&self, event: RunEvent) {
        // A send error only means there are zero receivers.
        let _ = self.event_tx.send(event);
    }

    /// Feed one progress event through the state machine and perform
    /// its side effect. Returns `true` when the run reached a terminal
    /// outcome and the caller should stop.
    async fn apply_event(&self, event: ProgressEvent) -> bool {
        let (effect, status) = {
            let mut machine = self.machine.lock().await;
            let effect = machine.apply(&event);
            (effect, machine.status())
        };

        if effect == Effect::Ignored {
            return false;
        }

        self.status_tx.send_replace(status);
        self.emit(RunEvent::Progress(event.clone()));

        match effect {
            Effect::FetchResult => {
                let _ = self.fetch_and_publish().await;
                true
            }
            Effect::NotifyFailure => {
                let message = if event.current_step.is_empty() {
                    "generation failed".to_string()
                } else {
                    event.current_step.clone()
                };
                tracing::warn!(job_id = %self.job_id, %message, "Job failed");
                self.emit(RunEvent::Failed { message });
                true
            }
            Effect::None | Effect::Ignored => false,
        }
    }

    /// Feed a pulled snapshot through the state machine as if it had
    /// arrived on the channel.
    async fn apply_snapshot(&self, snapshot: &JobSnapshot) -> bool {
        let event = ProgressEvent {
            job_id: snapshot.job_id.clone(),
            status: snapshot.status,
            percent: snapshot.percent,
            current_step: snapshot.current_step.clone(),
            estimated_completion: None,
            agent_activity: Default::default(),
        };
        self.apply_event(event).await
    }

    /// Fetch the artifact and publish the outcome as a run event.
    ///
    /// The fetch races the cancellation token: once the run is shut
    /// down, an in-flight response is dropped unprocessed.
    async fn fetch_and_publish(&self) -> Result<FetchOutcome, SourceError> {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::debug!(
                    job_id = %self.job_id,
                    "Run cancelled; ignoring in-flight artifact fetch",
                );
                return Ok(FetchOutcome::NotReady);
            }
            result = self.artifacts.fetch_artifact(&self.job_id) => result,
        };

        match &result {
            Ok(FetchOutcome::Ready(artifact)) => {
                tracing::info!(job_id = %self.job_id, title = %artifact.title, "Artifact fetched");
                self.emit(RunEvent::Completed(artifact.clone()));
            }
            Ok(FetchOutcome::NotReady) => {
                // Completion can be notified before the artifact is
                // durably queryable; this is a waiting state, not a
                // failure.
                tracing::info!(job_id = %self.job_id, "Artifact not ready yet; awaiting");
                self.emit(RunEvent::AwaitingArtifact);
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Artifact fetch failed");
                self.emit(RunEvent::FetchError {
                    message: e.to_string(),
                });
            }
        }

        result
    }
}

/// Drives one submitted job to a terminal outcome.
pub struct JobRun {
    shared: Arc<RunShared>,
    manager: Arc<ChannelManager>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl JobRun {
    /// Open the job's channel and start tracking it.
    ///
    /// Returns the run handle together with a run-event receiver that
    /// was subscribed before the channel opened, so no early event can
    /// be missed.
    pub async fn start(
        job_id: JobId,
        manager: Arc<ChannelManager>,
        artifacts: Arc<dyn ArtifactSource>,
        config: RunConfig,
    ) -> (Self, broadcast::Receiver<RunEvent>) {
        let (event_tx, event_rx) = broadcast::channel(RUN_EVENT_CAPACITY);
        let (status_tx, _) = watch::channel(JobStatus::Pending);

        let shared = Arc::new(RunShared {
            job_id: job_id.clone(),
            machine: Mutex::new(JobStateMachine::new(job_id.clone())),
            artifacts,
            event_tx,
            status_tx,
            cancel: CancellationToken::new(),
        });

        // Subscribe before opening so the first channel events are
        // already buffered for the run loop.
        let channel_rx = manager.subscribe();
        manager.open(job_id).await;

        let task = tokio::spawn(run_loop(
            Arc::clone(&shared),
            Arc::clone(&manager),
            channel_rx,
            config,
        ));

        let run = Self {
            shared,
            manager,
            task: Mutex::new(Some(task)),
        };
        (run, event_rx)
    }

    pub fn job_id(&self) -> &str {
        &self.shared.job_id
    }

    /// Subscribe to run events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Observable job status (latest adopted).
    pub fn status(&self) -> watch::Receiver<JobStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Manually pull the job status and feed it through the state
    /// machine. Useful after [`RunEvent::LiveUpdatesUnavailable`].
    pub async fn refresh_status(&self) -> Result<JobSnapshot, SourceError> {
        let snapshot = self.shared.artifacts.job_snapshot(&self.shared.job_id).await?;
        self.shared.apply_snapshot(&snapshot).await;
        Ok(snapshot)
    }

    /// Manually re-check the artifact.
    ///
    /// The affordance for [`RunEvent::AwaitingArtifact`]: fetches
    /// again and publishes the outcome as a run event. The job status
    /// is never altered by a fetch, in either direction.
    pub async fn recheck_artifact(&self) -> Result<FetchOutcome, SourceError> {
        self.shared.fetch_and_publish().await
    }

    /// Tear the run down: cancel pending reconnects, close the channel
    /// with a deliberate closure, and drop any in-flight fetch.
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.shared.cancel.cancel();
        self.manager.close().await;
        if let Some(task) = self.task.lock().await.take() {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, task).await;
        }
    }
}

/// Event loop for one run.
async fn run_loop(
    shared: Arc<RunShared>,
    manager: Arc<ChannelManager>,
    mut channel_rx: broadcast::Receiver<ChannelEvent>,
    config: RunConfig,
) {
    // The deadline is anchored to the last progress event, so channel
    // churn (reconnect flapping) cannot postpone the notice. Disarmed
    // after firing until the next progress event re-arms it.
    let mut stall_deadline = config.stall_timeout.map(|d| tokio::time::Instant::now() + d);

    loop {
        let stall = stall_wait(stall_deadline);
        tokio::pin!(stall);

        tokio::select! {
            _ = shared.cancel.cancelled() => break,

            _ = &mut stall => {
                stall_deadline = None;
                tracing::warn!(
                    job_id = %shared.job_id,
                    "No progress within the stall window",
                );
                shared.emit(RunEvent::Stalled);
            }

            received = channel_rx.recv() => match received {
                Ok(ChannelEvent::Progress(event)) => {
                    stall_deadline =
                        config.stall_timeout.map(|d| tokio::time::Instant::now() + d);
                    if shared.apply_event(event).await {
                        break;
                    }
                }
                Ok(ChannelEvent::UpdatesUnavailable) => {
                    shared.emit(RunEvent::LiveUpdatesUnavailable);
                    // The push channel is gone for good; one pull check
                    // resolves a job that already finished server-side.
                    match shared.artifacts.job_snapshot(&shared.job_id).await {
                        Ok(snapshot) => {
                            shared.apply_snapshot(&snapshot).await;
                        }
                        Err(e) => {
                            tracing::warn!(
                                job_id = %shared.job_id,
                                error = %e,
                                "Status pull after channel loss failed",
                            );
                        }
                    }
                    break;
                }
                Ok(ChannelEvent::Closed) => break,
                Ok(ChannelEvent::Connected | ChannelEvent::Reconnecting) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        job_id = %shared.job_id,
                        skipped,
                        "Run loop lagged behind channel events",
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    // The run is over one way or another; release the channel.
    manager.close().await;
}

/// Wait until the stall deadline, or forever when the watchdog is
/// disarmed.
async fn stall_wait(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
