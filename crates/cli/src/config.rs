use std::time::Duration;

use tempest_channel::BackoffConfig;
use tempest_session::RunConfig;

/// Client configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// Against a deployed service, override via environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the generation service REST API
    /// (default: `http://localhost:8000`).
    pub api_url: String,
    /// Base URL of the progress WebSocket endpoint
    /// (default: `ws://localhost:8000`).
    pub ws_url: String,
    /// Reconnect backoff tunables.
    pub backoff: BackoffConfig,
    /// Per-run tunables (stall watchdog).
    pub run: RunConfig,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `API_URL`                 | `http://localhost:8000` |
    /// | `WS_URL`                  | `ws://localhost:8000`   |
    /// | `RECONNECT_BASE_SECS`     | `1`                     |
    /// | `RECONNECT_MAX_SECS`      | `10`                    |
    /// | `RECONNECT_MAX_ATTEMPTS`  | `5`                     |
    /// | `STALL_TIMEOUT_SECS`      | unset (watchdog off)    |
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:8000".into());
        let ws_url = std::env::var("WS_URL").unwrap_or_else(|_| "ws://localhost:8000".into());

        let base_secs: u64 = std::env::var("RECONNECT_BASE_SECS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("RECONNECT_BASE_SECS must be a valid u64");

        let max_secs: u64 = std::env::var("RECONNECT_MAX_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("RECONNECT_MAX_SECS must be a valid u64");

        let max_attempts: u32 = std::env::var("RECONNECT_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("RECONNECT_MAX_ATTEMPTS must be a valid u32");

        let stall_timeout = std::env::var("STALL_TIMEOUT_SECS").ok().map(|raw| {
            let secs: u64 = raw.parse().expect("STALL_TIMEOUT_SECS must be a valid u64");
            Duration::from_secs(secs)
        });

        Self {
            api_url,
            ws_url,
            backoff: BackoffConfig {
                base_delay: Duration::from_secs(base_secs),
                max_delay: Duration::from_secs(max_secs),
                max_attempts,
            },
            run: RunConfig { stall_timeout },
        }
    }
}
