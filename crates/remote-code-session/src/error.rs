use remote_code_core::ApiError;
use thiserror::Error;

/// Directory operation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Session not found: {0}")]
    NotFound(String),
}

impl DirectoryError {
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_unauthorized())
    }

    /// Message suitable for display.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Api(e) => e.message().to_owned(),
            Self::NotFound(_) => self.to_string(),
        }
    }
}
