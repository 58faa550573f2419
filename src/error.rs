//! Error types for the signaling server

use crate::protocol::PeerId;
use thiserror::Error;

/// Errors that can occur while routing events between endpoints.
///
/// Routing errors are never surfaced to the sender; the matchmaker's caller
/// logs them and drops the message, matching best-effort relay semantics.
#[derive(Error, Debug)]
pub enum SignalingError {
    /// The target endpoint's outbound channel is closed (mid-disconnect).
    #[error("failed to send event to peer {0}")]
    SendError(PeerId),

    /// No live endpoint for the requested id, or the sender has no partner.
    #[error("unknown peer")]
    UnknownPeer,
}

/// Errors from client frames on the WebSocket connection.
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// Connection was closed
    #[error("connection closed")]
    Close,

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unsupported message type
    #[error("unsupported message type")]
    UnsupportedType,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
