//! Error types for fixture control
use crate::fixture::FixtureId;
use crate::link::LinkError;
use thiserror::Error;

/// Control errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// No matching fixture was discovered
    #[error("No matching fixture found")]
    NotFound,

    /// A fixture with this identifier is already connected
    #[error("Fixture {0} is already connected")]
    AlreadyRegistered(FixtureId),

    /// Link establishment failed
    #[error("Connection failed: {0}")]
    Connect(#[from] LinkError),

    /// Audio capture was refused or unavailable
    #[error("Audio capture denied: {0}")]
    CaptureDenied(String),

    /// Write attempted on a link that has gone away
    #[error("Fixture {0} is disconnected")]
    LinkDisconnected(FixtureId),

    /// Any other write failure
    #[error("Write to fixture {id} failed: {reason}")]
    TransportWrite {
        /// Fixture the write was addressed to
        id: FixtureId,
        /// Transport-provided reason
        reason: String,
    },

    /// The target set resolved to no fixtures
    #[error("No target fixtures selected")]
    NoTargets,

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
