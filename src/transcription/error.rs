//! Error types for transcription module

use crate::audio::AcquireError;
use std::time::Duration;

/// Errors surfaced by session operations and teardown
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Transcription is already active")]
    AlreadyActive,

    #[error("Transcription is not active")]
    NotActive,

    #[error("Audio capture failed: {0}")]
    Acquire(#[from] AcquireError),

    #[error("Connection timeout - server did not accept the connection within {}s", .0.as_secs())]
    ConnectTimeout(Duration),

    #[error("Handshake timeout - session was not created within {}s", .0.as_secs())]
    HandshakeTimeout(Duration),

    #[error("Configuration timeout - session update was not acknowledged within {}s", .0.as_secs())]
    ConfigTimeout(Duration),

    #[error("Connection lost - no response to heartbeat")]
    LinkLost,

    #[error("Connection closed: {0}")]
    ChannelClosed(String),

    #[error("Connection error: {0}")]
    Transport(#[from] TransportError),

    #[error("Server error: {message}")]
    Protocol {
        code: Option<String>,
        message: String,
    },

    #[error("Start cancelled by stop")]
    Stopped,

    #[error("Transcription engine is not running")]
    EngineStopped,
}

/// Errors opening or using the realtime channel
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Server unreachable: {0}")]
    Unreachable(String),
}

/// An inbound message that could not be parsed
#[derive(Debug, thiserror::Error)]
#[error("Malformed server message: {0}")]
pub struct DecodeError(#[from] serde_json::Error);
