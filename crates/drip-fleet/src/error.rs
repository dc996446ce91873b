//! Error types for the agent fleet

use thiserror::Error;

/// Result type alias for fleet operations
pub type Result<T> = std::result::Result<T, FleetError>;

/// Errors raised by sessions, the transport and configuration parsing
#[derive(Error, Debug)]
pub enum FleetError {
    // === Transport ===
    /// Request could not be built or sent, or the body could not be read
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a status the caller does not accept
    #[error("Expected 200, got {status}")]
    UnexpectedStatus { status: u16 },

    // === Protocol ===
    /// Response body was not the JSON shape we expected
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Registration succeeded at the HTTP level but carried no token
    #[error("Registration response carried no auth token")]
    MissingAuthToken,

    // === Configuration ===
    /// Heap size string could not be parsed into a byte count
    #[error("Invalid heap size: {0}")]
    InvalidHeapSize(String),

    /// Any other invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FleetError {
    /// Short label used to bucket failures in the run summary
    pub fn kind(&self) -> &'static str {
        match self {
            FleetError::Transport(e) if e.is_timeout() => "timeout",
            FleetError::Transport(_) => "transport",
            FleetError::UnexpectedStatus { .. } => "status",
            FleetError::Decode(_) => "decode",
            FleetError::MissingAuthToken => "auth_token",
            FleetError::InvalidHeapSize(_) | FleetError::Config(_) => "config",
        }
    }
}
