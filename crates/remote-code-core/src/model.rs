//! Data model shared with the session backend.
//!
//! Field names follow the backend's JSON: sessions use `snake_case`, file
//! entries use `camelCase` (`modTime`, `pageSize`).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, server-managed work context (shell process + working directory).
///
/// `name` is the routing key for every session-scoped call and for the
/// transport connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend identifier. Not used for routing.
    #[serde(default)]
    pub id: String,
    /// Unique, stable session name.
    pub name: String,
    /// Working directory, fixed at creation.
    #[serde(default)]
    pub work_dir: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether the backing process is alive.
    #[serde(default)]
    pub is_active: bool,
}

impl Session {
    /// Create a live session record stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, work_dir: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            work_dir: work_dir.into(),
            created_at: Utc::now(),
            is_active: true,
        }
    }
}

/// Body of `POST /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,
}

/// Body of `POST /sessions/{name}/command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendCommandRequest {
    pub command: String,
}

/// Response of `GET /sessions/{name}/output`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutput {
    #[serde(default)]
    pub output: String,
}

/// Response of `GET /sessions/{name}/stream`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLines {
    #[serde(default)]
    pub lines: Vec<String>,
}

/// Body of `POST /auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response of `POST /auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .finish()
    }
}

/// Response of `GET /auth/validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenValidation {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub tmux: bool,
}

/// File entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// One item of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Absolute path within the session's filesystem view.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "modTime", default)]
    pub mod_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permission: String,
}

impl FileEntry {
    /// Entry with only the fields the tree needs filled in.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            size: 0,
            mod_time: None,
            permission: String::new(),
        }
    }
}

/// Paging parameters for `GET /files`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

/// Response of `GET /files`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub items: Vec<FileEntry>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub page: u32,
    #[serde(rename = "pageSize", default)]
    pub page_size: u32,
}

/// Response of `GET /files/content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "modTime", default)]
    pub mod_time: Option<DateTime<Utc>>,
}

/// Body of `POST /files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFileRequest {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Body of `PUT /files/rename`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFileRequest {
    pub old_path: String,
    pub new_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_backend_json() {
        let json = r#"{
            "id": "abc",
            "name": "proj",
            "work_dir": "/tmp",
            "created_at": "2024-05-01T10:00:00+08:00",
            "is_active": true
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.name, "proj");
        assert_eq!(session.work_dir, "/tmp");
        assert!(session.is_active);
        assert_eq!(session.created_at.to_rfc3339(), "2024-05-01T02:00:00+00:00");
    }

    #[test]
    fn test_file_listing_field_names() {
        let json = r#"{
            "path": "/home",
            "items": [
                {"name": "a.txt", "path": "/home/a.txt", "type": "file", "size": 3,
                 "modTime": "2024-05-01T10:00:00.123456789Z", "permission": "-rw-r--r--"},
                {"name": "sub", "path": "/home/sub", "type": "directory", "size": 4096,
                 "modTime": "2024-05-01T10:00:00Z", "permission": "drwxr-xr-x"}
            ],
            "total": 2,
            "page": 1,
            "pageSize": 100
        }"#;
        let listing: FileListing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.items[0].kind, FileKind::File);
        assert!(listing.items[1].kind.is_dir());
        assert_eq!(listing.page_size, 100);
    }

    #[test]
    fn test_request_bodies_use_backend_names() {
        let body = serde_json::to_value(RenameFileRequest {
            old_path: "/a".into(),
            new_path: "/b".into(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"oldPath": "/a", "newPath": "/b"}));

        let body = serde_json::to_value(CreateSessionRequest {
            name: "proj".into(),
            work_dir: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"name": "proj"}));

        let body = serde_json::to_value(CreateFileRequest {
            path: "/a".into(),
            kind: FileKind::Directory,
            content: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"path": "/a", "type": "directory"}));
    }

    #[test]
    fn test_login_debug_redacts_secrets() {
        let req = LoginRequest {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{req:?}").contains("hunter2"));

        let resp = LoginResponse {
            token: "secret-token".into(),
            expires_at: 0,
            user_id: "admin".into(),
            username: "admin".into(),
        };
        assert!(!format!("{resp:?}").contains("secret-token"));
    }
}
