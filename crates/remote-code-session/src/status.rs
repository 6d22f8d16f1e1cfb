//! `loading` / `error` flags shared by every operation of a directory.
//!
//! The flags are last-write-wins: overlapping calls overwrite each other's
//! status, so `loading` may read `false` while another call is still in
//! flight. Callers needing per-call outcomes use the returned `Result`.

use parking_lot::RwLock;

use crate::error::DirectoryError;

/// Snapshot of a directory's status flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryStatus {
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
pub(crate) struct StatusCell(RwLock<DirectoryStatus>);

impl StatusCell {
    pub(crate) fn get(&self) -> DirectoryStatus {
        self.0.read().clone()
    }

    pub(crate) fn begin(&self) {
        let mut status = self.0.write();
        status.loading = true;
        status.error = None;
    }

    /// End a call started with [`Self::begin`].
    pub(crate) fn finish<T>(&self, result: &Result<T, DirectoryError>) {
        let mut status = self.0.write();
        status.loading = false;
        if let Err(e) = result {
            status.error = Some(e.message());
        }
    }

    /// Record a failure without touching `loading`.
    pub(crate) fn fail(&self, err: &DirectoryError) {
        self.0.write().error = Some(err.message());
    }
}
