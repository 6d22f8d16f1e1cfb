//! Session directory.
//!
//! Local cache of the sessions known to the backend. `list` replaces the
//! cache, `create` appends the server's answer, `delete` removes only after
//! the server confirms. The directory is the only writer of the
//! current-session pointer in the [`ClientContext`].

use parking_lot::RwLock;
use remote_code_core::{
    ClientContext, SelectionWriter, Session, SessionApi,
    model::{CreateSessionRequest, SendCommandRequest},
};

use crate::{
    error::DirectoryError,
    status::{DirectoryStatus, StatusCell},
};

/// Default line count for [`SessionDirectory::stream_output`].
pub const DEFAULT_STREAM_LINES: u32 = 100;

/// Cached session list plus the current-session pointer.
///
/// The cache only changes after the backend confirms a call.
pub struct SessionDirectory<A>
where
    A: SessionApi,
{
    api: A,
    context: ClientContext,
    selection: SelectionWriter,
    sessions: RwLock<Vec<Session>>,
    status: StatusCell,
}

impl<A> SessionDirectory<A>
where
    A: SessionApi,
{
    /// Create an empty directory. Takes the context's selection writer.
    #[must_use]
    pub fn new(api: A, context: ClientContext, selection: SelectionWriter) -> Self {
        Self {
            api,
            context,
            selection,
            sessions: RwLock::new(Vec::new()),
            status: StatusCell::default(),
        }
    }

    /// Snapshot of the cached sessions.
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.read().clone()
    }

    /// Sessions whose backing process is alive.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<Session> {
        self.sessions
            .read()
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.context.current_session()
    }

    #[must_use]
    pub fn status(&self) -> DirectoryStatus {
        self.status.get()
    }

    /// Replace the cache with the server's list.
    ///
    /// # Errors
    /// Returns error if the request fails. The cache is left as it was.
    pub async fn list(&self) -> Result<Vec<Session>, DirectoryError> {
        self.status.begin();
        let result = self.api.list().await.map_err(DirectoryError::from);
        if let Ok(sessions) = &result {
            tracing::debug!(count = sessions.len(), "Session list refreshed");
            (*self.sessions.write()).clone_from(sessions);
        }
        self.finish("list sessions", &result);
        result
    }

    /// Re-read one session and update its cache entry, appending it if it
    /// was not cached. A current pointer naming it is refreshed too.
    ///
    /// # Errors
    /// Returns error if the request fails. The cache is left as it was.
    pub async fn fetch_one(&self, name: &str) -> Result<Session, DirectoryError> {
        self.status.begin();
        let result = self.api.get(name).await.map_err(DirectoryError::from);
        if let Ok(session) = &result {
            let mut sessions = self.sessions.write();
            match sessions.iter_mut().find(|s| s.name == session.name) {
                Some(cached) => cached.clone_from(session),
                None => sessions.push(session.clone()),
            }
            drop(sessions);
            if self.context.current_session_name().as_deref() == Some(session.name.as_str()) {
                self.selection.set(Some(session.clone()));
            }
        }
        self.finish("fetch session", &result);
        result
    }

    /// Create a session and append it to the cache.
    ///
    /// # Errors
    /// Returns error if the backend refuses. The cache is left as it was.
    pub async fn create(&self, name: &str, work_dir: Option<&str>) -> Result<Session, DirectoryError> {
        let req = CreateSessionRequest {
            name: name.to_owned(),
            work_dir: work_dir.map(str::to_owned),
        };
        self.status.begin();
        let result = self.api.create(&req).await.map_err(DirectoryError::from);
        if let Ok(session) = &result {
            tracing::info!(session = %session.name, work_dir = %session.work_dir, "Session created");
            self.sessions.write().push(session.clone());
        }
        self.finish("create session", &result);
        result
    }

    /// Delete a session once the backend confirms. Clears the current
    /// pointer if it named this session.
    ///
    /// # Errors
    /// Returns error if the backend refuses. The cache is left as it was.
    pub async fn delete(&self, name: &str) -> Result<(), DirectoryError> {
        self.status.begin();
        let result = self.api.delete(name).await.map_err(DirectoryError::from);
        if result.is_ok() {
            self.sessions.write().retain(|s| s.name != name);
            if self.selection.clear_if(name) {
                tracing::debug!(session = %name, "Cleared current session");
            }
            tracing::info!(session = %name, "Session deleted");
        }
        self.finish("delete session", &result);
        result
    }

    /// Forward a command over REST. Leaves the cache untouched.
    ///
    /// # Errors
    /// Returns error if the backend refuses.
    pub async fn send_command(&self, name: &str, command: &str) -> Result<(), DirectoryError> {
        let req = SendCommandRequest {
            command: command.to_owned(),
        };
        let result = self
            .api
            .send_command(name, &req)
            .await
            .map_err(DirectoryError::from);
        if let Err(e) = &result {
            tracing::warn!(session = %name, "Failed to send command: {e}");
            self.status.fail(e);
        }
        result
    }

    /// Cached session with this name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Session> {
        self.sessions.read().iter().find(|s| s.name == name).cloned()
    }

    /// Cached session with this name, or `NotFound`.
    ///
    /// # Errors
    /// Returns `NotFound` if no cached session has this name.
    pub fn require(&self, name: &str) -> Result<Session, DirectoryError> {
        self.get_by_name(name)
            .ok_or_else(|| DirectoryError::NotFound(name.to_owned()))
    }

    /// Make the named session current. Returns `None`, leaving the pointer
    /// unchanged, if it is not cached.
    pub fn select(&self, name: &str) -> Option<Session> {
        let session = self.get_by_name(name)?;
        self.selection.set(Some(session.clone()));
        Some(session)
    }

    /// Set or clear the current pointer directly.
    pub fn set_current(&self, session: Option<Session>) {
        self.selection.set(session);
    }

    /// Latest captured terminal output.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn output(&self, name: &str) -> Result<String, DirectoryError> {
        let output = self.api.output(name).await?;
        Ok(output.output)
    }

    /// Last `lines` lines of terminal output.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn stream_output(&self, name: &str, lines: u32) -> Result<Vec<String>, DirectoryError> {
        let output = self.api.stream_output(name, lines).await?;
        Ok(output.lines)
    }

    fn finish<T>(&self, action: &str, result: &Result<T, DirectoryError>) {
        if let Err(e) = result {
            tracing::warn!(action, "Session request failed: {e}");
        }
        self.status.finish(result);
    }
}
