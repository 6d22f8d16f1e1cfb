//! File directory.
//!
//! Caches one directory listing of the session's filesystem plus the
//! current path, a selected file and a stored tree view. Every successful
//! mutation is followed by a re-fetch of the current path, so the listing
//! always reflects the backend.

use parking_lot::RwLock;
use remote_code_core::{
    FileApi, FileEntry, FileKind, FileTreeNode, Session, build_tree,
    model::{CreateFileRequest, FileContent, FileListing, PageRequest, RenameFileRequest},
};

use crate::{
    error::DirectoryError,
    status::{DirectoryStatus, StatusCell},
};

/// Path shown before the first fetch.
pub const ROOT_PATH: &str = "/";

struct Listing {
    current_path: String,
    files: Vec<FileEntry>,
    total: usize,
    selected: Option<String>,
    tree: Vec<FileTreeNode>,
}

/// Listing of one remote directory, with a selection and a derived tree.
pub struct FileDirectory<A>
where
    A: FileApi,
{
    api: A,
    listing: RwLock<Listing>,
    status: StatusCell,
}

impl<A> FileDirectory<A>
where
    A: FileApi,
{
    /// Create a directory positioned at [`ROOT_PATH`] with nothing loaded.
    #[must_use]
    pub fn new(api: A) -> Self {
        Self {
            api,
            listing: RwLock::new(Listing {
                current_path: ROOT_PATH.to_owned(),
                files: Vec::new(),
                total: 0,
                selected: None,
                tree: Vec::new(),
            }),
            status: StatusCell::default(),
        }
    }

    #[must_use]
    pub fn current_path(&self) -> String {
        self.listing.read().current_path.clone()
    }

    #[must_use]
    pub fn files(&self) -> Vec<FileEntry> {
        self.listing.read().files.clone()
    }

    /// Entry count reported by the backend for the current path, across
    /// all pages.
    #[must_use]
    pub fn total(&self) -> usize {
        self.listing.read().total
    }

    #[must_use]
    pub fn selected(&self) -> Option<String> {
        self.listing.read().selected.clone()
    }

    pub fn set_selected(&self, path: Option<String>) {
        self.listing.write().selected = path;
    }

    #[must_use]
    pub fn tree(&self) -> Vec<FileTreeNode> {
        self.listing.read().tree.clone()
    }

    /// Replace the stored tree view.
    pub fn update_tree(&self, nodes: Vec<FileTreeNode>) {
        self.listing.write().tree = nodes;
    }

    /// Tree nodes for `entries` under `parent_path`. Pure.
    #[must_use]
    pub fn build_tree(&self, entries: &[FileEntry], parent_path: &str) -> Vec<FileTreeNode> {
        build_tree(entries, parent_path)
    }

    #[must_use]
    pub fn status(&self) -> DirectoryStatus {
        self.status.get()
    }

    /// Replace the listing and current path with the backend's view of
    /// `path`.
    ///
    /// # Errors
    /// Returns error if the request fails. The listing is left as it was.
    pub async fn fetch(&self, path: &str) -> Result<Vec<FileEntry>, DirectoryError> {
        self.status.begin();
        let result = self.load(path, None).await.map(|listing| listing.items);
        self.finish("fetch files", &result);
        result
    }

    /// Like [`Self::fetch`], for one page of a large directory.
    ///
    /// # Errors
    /// Returns error if the request fails. The listing is left as it was.
    pub async fn fetch_page(&self, path: &str, page: PageRequest) -> Result<FileListing, DirectoryError> {
        self.status.begin();
        let result = self.load(path, Some(page)).await;
        self.finish("fetch files", &result);
        result
    }

    /// Show the working directory of `session`.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn open_session(&self, session: &Session) -> Result<Vec<FileEntry>, DirectoryError> {
        let path = if session.work_dir.is_empty() {
            ROOT_PATH
        } else {
            session.work_dir.as_str()
        };
        self.fetch(path).await
    }

    /// Read a file. Does not touch the listing.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_content(&self, path: &str) -> Result<FileContent, DirectoryError> {
        self.status.begin();
        let result = self.api.content(path).await.map_err(DirectoryError::from);
        self.finish("read file", &result);
        result
    }

    /// Create a file or directory, then re-fetch the current path.
    ///
    /// # Errors
    /// Returns error if the creation or the refresh fails.
    pub async fn create(
        &self,
        path: &str,
        kind: FileKind,
        content: Option<String>,
    ) -> Result<FileEntry, DirectoryError> {
        let req = CreateFileRequest {
            path: path.to_owned(),
            kind,
            content,
        };
        self.status.begin();
        let result: Result<FileEntry, DirectoryError> = async {
            let entry = self.api.create(&req).await?;
            self.refresh().await?;
            Ok(entry)
        }
        .await;
        self.finish("create file", &result);
        result
    }

    /// Rename or move an entry, then re-fetch the current path.
    ///
    /// # Errors
    /// Returns error if the rename or the refresh fails.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<FileEntry, DirectoryError> {
        let req = RenameFileRequest {
            old_path: old_path.to_owned(),
            new_path: new_path.to_owned(),
        };
        self.status.begin();
        let result: Result<FileEntry, DirectoryError> = async {
            let entry = self.api.rename(&req).await?;
            self.refresh().await?;
            Ok(entry)
        }
        .await;
        self.finish("rename file", &result);
        result
    }

    /// Delete an entry, then re-fetch the current path.
    ///
    /// A selection of `path` is cleared once the backend confirms the
    /// deletion, so it is gone even when only the refresh fails.
    ///
    /// # Errors
    /// Returns error if the deletion or the refresh fails.
    pub async fn delete(&self, path: &str) -> Result<(), DirectoryError> {
        self.status.begin();
        let result: Result<(), DirectoryError> = async {
            self.api.delete(path).await?;
            {
                let mut listing = self.listing.write();
                if listing.selected.as_deref() == Some(path) {
                    listing.selected = None;
                }
            }
            self.refresh().await?;
            Ok(())
        }
        .await;
        self.finish("delete file", &result);
        result
    }

    async fn refresh(&self) -> Result<(), DirectoryError> {
        let path = self.current_path();
        self.load(&path, None).await.map(|_| ())
    }

    async fn load(&self, path: &str, page: Option<PageRequest>) -> Result<FileListing, DirectoryError> {
        let listing = self.api.list(path, page).await?;
        let mut state = self.listing.write();
        state.current_path = if listing.path.is_empty() {
            path.to_owned()
        } else {
            listing.path.clone()
        };
        state.files.clone_from(&listing.items);
        state.total = listing.total;
        tracing::debug!(path = %state.current_path, count = state.files.len(), "Listing refreshed");
        Ok(listing)
    }

    fn finish<T>(&self, action: &str, result: &Result<T, DirectoryError>) {
        if let Err(e) = result {
            tracing::warn!(action, "File request failed: {e}");
        }
        self.status.finish(result);
    }
}
