//! Transport errors.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Error opening or using a session channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),
    #[error("Handshake rejected: unauthorized")]
    Unauthorized,
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) if response.status().as_u16() == 401 => {
                Self::Unauthorized
            }
            other => Self::Connect(other.to_string()),
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
