//! Progress frame decoding.
//!
//! The service sends JSON text frames shaped like
//! `{"job_id": "...", "status": "researching", "percent": 40, ...}`.
//! A frame that fails to decode is logged and dropped by the caller;
//! a single bad message must never terminate an otherwise healthy
//! connection.

use tempest_core::ProgressEvent;

/// Why a frame was rejected.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Malformed JSON or missing required fields.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// `percent` outside the 0–100 wire contract.
    #[error("percent {0} out of range")]
    PercentOutOfRange(u8),
}

/// Parse a progress text frame into a typed [`ProgressEvent`].
///
/// Returns `Err` for malformed JSON, missing required fields, or an
/// out-of-range percentage. Callers should log and continue.
pub fn parse_frame(text: &str) -> Result<ProgressEvent, FrameError> {
    let event: ProgressEvent = serde_json::from_str(text)?;
    if event.percent > 100 {
        return Err(FrameError::PercentOutOfRange(event.percent));
    }
    Ok(event)
}
