//! Error types shared across crate boundaries.

use thiserror::Error;

/// Error returned by a call to the session backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The backend rejected the credentials (401).
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },
    /// Any other non-success response.
    #[error("Request failed ({status}): {message}")]
    Request { status: u16, message: String },
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether this is an authentication rejection.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Human-readable message without the variant prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized { message } | Self::Request { message, .. } => message,
            Self::Transport(message) | Self::Decode(message) => message,
        }
    }

    /// HTTP status, when the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Request { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

/// Token storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Internal(String),
}
