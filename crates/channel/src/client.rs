//! WebSocket client for one job's progress channel.
//!
//! [`ChannelClient`] holds the connection target for a single job.
//! Call [`ChannelClient::connect`] to establish a live
//! [`ChannelConnection`] over WebSocket.

use tokio_tungstenite::{connect_async, MaybeTlsStream};

use tempest_core::JobId;

/// Configuration handle for one job's channel.
///
/// Stores the WebSocket base URL and the job id used as the routing
/// key. Create a [`ChannelConnection`] by calling
/// [`connect`](Self::connect).
pub struct ChannelClient {
    ws_url: String,
    job_id: JobId,
}

/// A live WebSocket connection for one job.
pub struct ChannelConnection {
    /// The job this channel is keyed by.
    pub job_id: JobId,
    /// Unique id for this connection, used to correlate log lines
    /// across reconnects.
    pub connection_id: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl ChannelClient {
    /// Create a new client targeting one job's channel.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8000`.
    /// * `job_id` - job identifier returned at submission time.
    pub fn new(ws_url: String, job_id: JobId) -> Self {
        Self { ws_url, job_id }
    }

    /// Job identifier this client is keyed by.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// WebSocket base URL (e.g. `ws://host:8000`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the per-job WebSocket endpoint.
    pub async fn connect(&self) -> Result<ChannelConnection, ChannelError> {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/ws/research/{}", self.ws_url, self.job_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ChannelError::Connection(format!("Failed to connect to {}: {e}", self.ws_url))
        })?;

        tracing::info!(
            job_id = %self.job_id,
            connection_id = %connection_id,
            "Connected to progress channel at {}",
            self.ws_url,
        );

        Ok(ChannelConnection {
            job_id: self.job_id.clone(),
            connection_id,
            ws_stream,
        })
    }
}

/// Errors that can occur when working with the channel client.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
