//! Exponential-backoff reconnection for the progress channel.
//!
//! When the channel drops without a deliberate close, the manager
//! calls [`reconnect_loop`] to retry with increasing delays. Retrying
//! is bounded: after [`BackoffConfig::max_attempts`] consecutive
//! failures the loop gives up and the caller surfaces a terminal
//! connection error instead of retrying forever.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{ChannelClient, ChannelConnection};

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

/// Delay before reconnect attempt `attempt` (zero-based).
///
/// Computed as `base_delay * 2^attempt`, clamped to
/// [`BackoffConfig::max_delay`]. With the defaults this yields
/// 1s, 2s, 4s, 8s, 10s, 10s, ...
pub fn delay_for_attempt(attempt: u32, config: &BackoffConfig) -> Duration {
    config
        .base_delay
        .saturating_mul(1u32 << attempt.min(31))
        .min(config.max_delay)
}

/// Result of a bounded reconnect loop.
pub enum ReconnectOutcome {
    /// A connection was re-established.
    Restored(ChannelConnection),
    /// All attempts failed; the caller should stop retrying and
    /// surface that live updates are unavailable.
    ExhaustedAttempts,
    /// The cancellation token was triggered before success.
    Cancelled,
}

/// Attempt to reconnect with exponential backoff.
///
/// Each attempt waits its backoff delay first, so a closure at attempt
/// zero schedules a retry after `base_delay`. The attempt counter is
/// local to this call; a successful connection therefore resets it for
/// the next disconnect.
pub async fn reconnect_loop(
    client: &ChannelClient,
    config: &BackoffConfig,
    cancel: &CancellationToken,
) -> ReconnectOutcome {
    for attempt in 0..config.max_attempts {
        let delay = delay_for_attempt(attempt, config);
        tracing::info!(
            job_id = %client.job_id(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %client.job_id(), "Reconnect cancelled");
                return ReconnectOutcome::Cancelled;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
            result = client.connect() => {
                match result {
                    Ok(conn) => {
                        tracing::info!(
                            job_id = %client.job_id(),
                            attempt,
                            "Reconnected to progress channel",
                        );
                        return ReconnectOutcome::Restored(conn);
                    }
                    Err(e) => {
                        tracing::warn!(
                            job_id = %client.job_id(),
                            error = %e,
                            "Reconnect attempt {attempt} failed",
                        );
                    }
                }
            }
        }
    }

    tracing::warn!(
        job_id = %client.job_id(),
        attempts = config.max_attempts,
        "Reconnect attempts exhausted",
    );
    ReconnectOutcome::ExhaustedAttempts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let config = BackoffConfig::default();
        assert_eq!(delay_for_attempt(0, &config), Duration::from_secs(1));
        assert_eq!(delay_for_attempt(1, &config), Duration::from_secs(2));
        assert_eq!(delay_for_attempt(2, &config), Duration::from_secs(4));
        assert_eq!(delay_for_attempt(3, &config), Duration::from_secs(8));
    }

    #[test]
    fn delay_clamps_at_max() {
        let config = BackoffConfig::default();
        // 2^4 = 16s would exceed the 10s cap.
        assert_eq!(delay_for_attempt(4, &config), Duration::from_secs(10));
        assert_eq!(delay_for_attempt(5, &config), Duration::from_secs(10));
        assert_eq!(delay_for_attempt(20, &config), Duration::from_secs(10));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = BackoffConfig::default();
        let expected = [1, 2, 4, 8, 10, 10, 10];
        for (attempt, &secs) in expected.iter().enumerate() {
            assert_eq!(
                delay_for_attempt(attempt as u32, &config),
                Duration::from_secs(secs),
            );
        }
    }

    #[test]
    fn custom_base_delay() {
        let config = BackoffConfig {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(400),
            max_attempts: 5,
        };
        assert_eq!(delay_for_attempt(0, &config), Duration::from_millis(50));
        assert_eq!(delay_for_attempt(2, &config), Duration::from_millis(200));
        assert_eq!(delay_for_attempt(3, &config), Duration::from_millis(400));
        assert_eq!(delay_for_attempt(4, &config), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn cancellation_token_stops_reconnect() {
        let cancel = CancellationToken::new();
        // Cancel up front; the loop should return without connecting.
        cancel.cancel();

        let client = ChannelClient::new("ws://localhost:9".into(), "job-1".into());
        let config = BackoffConfig::default();

        let outcome = reconnect_loop(&client, &config, &cancel).await;
        assert!(matches!(outcome, ReconnectOutcome::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_against_dead_server() {
        // Nothing listens on the discard port, so every attempt fails
        // fast with a refused connection. Paused time skips the
        // backoff delays.
        let client = ChannelClient::new("ws://127.0.0.1:9".into(), "job-1".into());
        let config = BackoffConfig::default();
        let cancel = CancellationToken::new();

        let outcome = reconnect_loop(&client, &config, &cancel).await;
        assert!(matches!(outcome, ReconnectOutcome::ExhaustedAttempts));
    }
}
