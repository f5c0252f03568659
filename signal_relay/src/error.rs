//! Error types for the signaling relay

use thiserror::Error;

/// Errors that can occur while talking to a connected peer
#[derive(Error, Debug)]
pub enum SignalingError {
    /// Failed to send message to peer
    #[error("Failed to send message: {0}")]
    SendError(String),

    /// The connection was already closed
    #[error("Connection closed")]
    Closed,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),
}

/// Errors from client requests.
///
/// The `Display` text of each variant is exactly the `message` field of the
/// `error` reply sent back to the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientRequestError {
    /// The frame was not valid JSON
    #[error("Invalid JSON")]
    InvalidJson,

    /// Unsupported message type
    #[error("Unknown message type")]
    UnknownType,

    /// A routed message had no target peer
    #[error("missing 'to'")]
    MissingTarget,

    /// A join had an empty room name
    #[error("room required")]
    RoomRequired,
}
