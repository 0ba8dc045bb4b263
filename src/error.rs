//! Error types for the portal and the playback session

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("HTTP error: {status}")]
    Status { status: u16 },
    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid channel list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Playlist contains no channels")]
    Empty,
}

/// Any reason a pre-roll ad could not be shown. Always recovered locally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdError {
    #[error("Ad inventory unavailable: {0}")]
    Unavailable(String),
    #[error("Ad playback rejected: {0}")]
    Rejected(String),
    #[error("Ad failed to play: {0}")]
    Playback(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CredentialsError {
    #[error("Channel not found: {channel}")]
    NotFound { channel: String },
    #[error("Access denied for channel: {channel}")]
    AccessDenied { channel: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid channel data: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Failed to launch player '{player}': {reason}")]
    Spawn { player: String, reason: String },
    #[error("Player '{player}' cannot decrypt clear-key streams")]
    DrmUnsupported { player: String },
    #[error("Empty manifest URI")]
    EmptyManifest,
    #[error("Player exited with code {code:?}")]
    Exited { code: Option<i32> },
    #[error("Failed to monitor player: {0}")]
    Monitor(String),
}

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("HTTP error: {status}")]
    Status { status: u16 },
    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to persist view counts: {0}")]
    Io(#[from] std::io::Error),
}
