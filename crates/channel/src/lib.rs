//! Per-job progress channel for the Tempest client.
//!
//! Provides the WebSocket client keyed by job id, typed frame
//! decoding, exponential-backoff reconnection, and the
//! [`ChannelManager`] that owns one live channel at a time and exposes
//! connection-state and last-message observables.

pub mod client;
pub mod manager;
pub mod messages;
pub mod reconnect;
pub mod state;

pub use client::{ChannelClient, ChannelConnection, ChannelError};
pub use manager::{ChannelConfig, ChannelEvent, ChannelManager};
pub use messages::{parse_frame, FrameError};
pub use reconnect::{delay_for_attempt, BackoffConfig, ReconnectOutcome};
pub use state::ConnectionState;
