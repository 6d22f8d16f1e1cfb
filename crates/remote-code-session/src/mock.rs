//! In-memory backends for directory tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use remote_code_core::{
    ApiError, FileApi, FileEntry, FileKind, Session, SessionApi,
    model::{
        CreateFileRequest, CreateSessionRequest, FileContent, FileListing, OutputLines,
        PageRequest, RenameFileRequest, SendCommandRequest, SessionOutput,
    },
};

#[derive(Default)]
pub struct MockSessionApi {
    remote: Mutex<Vec<Session>>,
    commands: Mutex<Vec<(String, String)>>,
    fail_next: Mutex<Option<ApiError>>,
    list_calls: Mutex<usize>,
}

impl MockSessionApi {
    pub fn with_sessions(names: &[&str]) -> Self {
        let api = Self::default();
        *api.remote.lock() = names.iter().map(|n| Session::new(*n, "/")).collect();
        api
    }

    pub fn remove_remote(&self, name: &str) {
        self.remote.lock().retain(|s| s.name != name);
    }

    pub fn set_active(&self, name: &str, active: bool) {
        for s in self.remote.lock().iter_mut().filter(|s| s.name == name) {
            s.is_active = active;
        }
    }

    /// Make the next call fail with `err`.
    pub fn fail_next(&self, err: ApiError) {
        *self.fail_next.lock() = Some(err);
    }

    pub fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock().clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock()
    }

    fn check(&self) -> Result<(), ApiError> {
        self.fail_next.lock().take().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl SessionApi for MockSessionApi {
    async fn list(&self) -> Result<Vec<Session>, ApiError> {
        self.check()?;
        *self.list_calls.lock() += 1;
        Ok(self.remote.lock().clone())
    }

    async fn get(&self, name: &str) -> Result<Session, ApiError> {
        self.check()?;
        self.remote
            .lock()
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| not_found("session not found"))
    }

    async fn create(&self, req: &CreateSessionRequest) -> Result<Session, ApiError> {
        self.check()?;
        let session = Session::new(req.name.clone(), req.work_dir.clone().unwrap_or_default());
        self.remote.lock().push(session.clone());
        Ok(session)
    }

    async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.check()?;
        self.remove_remote(name);
        Ok(())
    }

    async fn output(&self, name: &str) -> Result<SessionOutput, ApiError> {
        self.check()?;
        Ok(SessionOutput {
            output: format!("output of {name}"),
        })
    }

    async fn send_command(&self, name: &str, req: &SendCommandRequest) -> Result<(), ApiError> {
        self.check()?;
        self.commands.lock().push((name.to_owned(), req.command.clone()));
        Ok(())
    }

    async fn stream_output(&self, name: &str, lines: u32) -> Result<OutputLines, ApiError> {
        self.check()?;
        let lines = ["$ ", name].iter().take(lines as usize).map(ToString::to_string).collect();
        Ok(OutputLines { lines })
    }
}

/// Flat filesystem keyed by absolute path.
#[derive(Default)]
pub struct MockFileApi {
    files: Mutex<BTreeMap<String, (FileKind, String)>>,
    fail_next: Mutex<Option<ApiError>>,
    fail_next_list: Mutex<Option<ApiError>>,
    list_calls: Mutex<Vec<String>>,
}

impl MockFileApi {
    pub fn with_files(entries: &[(&str, FileKind)]) -> Self {
        let api = Self::default();
        {
            let mut files = api.files.lock();
            for (path, kind) in entries {
                files.insert((*path).to_owned(), (*kind, format!("contents of {path}")));
            }
        }
        api
    }

    pub fn fail_next(&self, err: ApiError) {
        *self.fail_next.lock() = Some(err);
    }

    /// Fail the next `list` only, letting other calls through.
    pub fn fail_next_list(&self, err: ApiError) {
        *self.fail_next_list.lock() = Some(err);
    }

    /// Paths passed to every `list` call so far.
    pub fn list_calls(&self) -> Vec<String> {
        self.list_calls.lock().clone()
    }

    fn check(&self) -> Result<(), ApiError> {
        self.fail_next.lock().take().map_or(Ok(()), Err)
    }

    fn entry(path: &str, kind: FileKind, content: &str) -> FileEntry {
        let name = path.rsplit('/').next().unwrap_or(path);
        let mut entry = FileEntry::new(name, path, kind);
        entry.size = content.len() as u64;
        entry
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn not_found(message: &str) -> ApiError {
    ApiError::Request {
        status: 404,
        message: message.to_owned(),
    }
}

#[async_trait]
impl FileApi for MockFileApi {
    async fn list(&self, path: &str, page: Option<PageRequest>) -> Result<FileListing, ApiError> {
        self.check()?;
        if let Some(err) = self.fail_next_list.lock().take() {
            return Err(err);
        }
        self.list_calls.lock().push(path.to_owned());
        let items: Vec<FileEntry> = self
            .files
            .lock()
            .iter()
            .filter(|(p, _)| parent_of(p) == path)
            .map(|(p, (kind, content))| Self::entry(p, *kind, content))
            .collect();
        let total = items.len();
        let (page, page_size) = page.map_or((1, 100), |p| (p.page, p.page_size));
        let skip = (page.saturating_sub(1) * page_size) as usize;
        Ok(FileListing {
            path: path.to_owned(),
            items: items.into_iter().skip(skip).take(page_size as usize).collect(),
            total,
            page,
            page_size,
        })
    }

    async fn content(&self, path: &str) -> Result<FileContent, ApiError> {
        self.check()?;
        let files = self.files.lock();
        let (_, content) = files.get(path).ok_or_else(|| not_found("file not found"))?;
        Ok(FileContent {
            path: path.to_owned(),
            content: content.clone(),
            size: content.len() as u64,
            mod_time: None,
        })
    }

    async fn create(&self, req: &CreateFileRequest) -> Result<FileEntry, ApiError> {
        self.check()?;
        let content = req.content.clone().unwrap_or_default();
        let entry = Self::entry(&req.path, req.kind, &content);
        self.files.lock().insert(req.path.clone(), (req.kind, content));
        Ok(entry)
    }

    async fn rename(&self, req: &RenameFileRequest) -> Result<FileEntry, ApiError> {
        self.check()?;
        let mut files = self.files.lock();
        let (kind, content) = files
            .remove(&req.old_path)
            .ok_or_else(|| not_found("file not found"))?;
        let entry = Self::entry(&req.new_path, kind, &content);
        files.insert(req.new_path.clone(), (kind, content));
        Ok(entry)
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.check()?;
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found("file not found"))
    }
}
