//! Collaborator traits for the session backend and local storage.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{ApiError, StorageError},
    model::{
        CreateFileRequest, CreateSessionRequest, FileContent, FileEntry, FileListing,
        HealthStatus, LoginRequest, LoginResponse, OutputLines, PageRequest, RenameFileRequest,
        SendCommandRequest, Session, SessionOutput, TokenValidation,
    },
};

/// Remote session registry.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// List all sessions.
    async fn list(&self) -> Result<Vec<Session>, ApiError>;

    /// Get a session by name.
    async fn get(&self, name: &str) -> Result<Session, ApiError>;

    /// Create a session.
    async fn create(&self, req: &CreateSessionRequest) -> Result<Session, ApiError>;

    /// Terminate a session.
    async fn delete(&self, name: &str) -> Result<(), ApiError>;

    /// Capture the session's current terminal output.
    async fn output(&self, name: &str) -> Result<SessionOutput, ApiError>;

    /// Run a command in the session.
    async fn send_command(&self, name: &str, req: &SendCommandRequest) -> Result<(), ApiError>;

    /// Last `lines` lines of output.
    async fn stream_output(&self, name: &str, lines: u32) -> Result<OutputLines, ApiError>;
}

/// Remote filesystem view.
#[async_trait]
pub trait FileApi: Send + Sync {
    /// List one directory.
    async fn list(&self, path: &str, page: Option<PageRequest>) -> Result<FileListing, ApiError>;

    /// Read a file.
    async fn content(&self, path: &str) -> Result<FileContent, ApiError>;

    /// Create a file or directory.
    async fn create(&self, req: &CreateFileRequest) -> Result<FileEntry, ApiError>;

    /// Rename or move an entry.
    async fn rename(&self, req: &RenameFileRequest) -> Result<FileEntry, ApiError>;

    /// Delete an entry.
    async fn delete(&self, path: &str) -> Result<(), ApiError>;
}

/// Authentication endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, ApiError>;

    async fn validate(&self) -> Result<TokenValidation, ApiError>;
}

/// Backend liveness.
#[async_trait]
pub trait HealthApi: Send + Sync {
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

/// Durable storage for the credential token.
pub trait TokenStore: Send + Sync {
    /// Load the stored token.
    ///
    /// # Errors
    /// Returns error if the backing store cannot be read.
    fn load(&self) -> Result<Option<String>, StorageError>;

    /// Persist a token, replacing any previous one.
    ///
    /// # Errors
    /// Returns error if the backing store cannot be written.
    fn save(&self, token: &str) -> Result<(), StorageError>;

    /// Remove the stored token. Succeeds if none was stored.
    ///
    /// # Errors
    /// Returns error if the backing store cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Receives authentication rejections observed outside the REST path,
/// e.g. a refused WebSocket handshake.
pub trait RejectionSink: Send + Sync {
    /// `used` is the token the rejected attempt carried.
    fn credentials_rejected(&self, used: Option<&str>);
}

#[async_trait]
impl<T: SessionApi + ?Sized> SessionApi for Arc<T> {
    async fn list(&self) -> Result<Vec<Session>, ApiError> {
        (**self).list().await
    }

    async fn get(&self, name: &str) -> Result<Session, ApiError> {
        (**self).get(name).await
    }

    async fn create(&self, req: &CreateSessionRequest) -> Result<Session, ApiError> {
        (**self).create(req).await
    }

    async fn delete(&self, name: &str) -> Result<(), ApiError> {
        (**self).delete(name).await
    }

    async fn output(&self, name: &str) -> Result<SessionOutput, ApiError> {
        (**self).output(name).await
    }

    async fn send_command(&self, name: &str, req: &SendCommandRequest) -> Result<(), ApiError> {
        (**self).send_command(name, req).await
    }

    async fn stream_output(&self, name: &str, lines: u32) -> Result<OutputLines, ApiError> {
        (**self).stream_output(name, lines).await
    }
}

#[async_trait]
impl<T: FileApi + ?Sized> FileApi for Arc<T> {
    async fn list(&self, path: &str, page: Option<PageRequest>) -> Result<FileListing, ApiError> {
        (**self).list(path, page).await
    }

    async fn content(&self, path: &str) -> Result<FileContent, ApiError> {
        (**self).content(path).await
    }

    async fn create(&self, req: &CreateFileRequest) -> Result<FileEntry, ApiError> {
        (**self).create(req).await
    }

    async fn rename(&self, req: &RenameFileRequest) -> Result<FileEntry, ApiError> {
        (**self).rename(req).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        (**self).delete(path).await
    }
}
