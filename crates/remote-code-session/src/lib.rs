//! Local directories over the session backend.
//!
//! Provides:
//! - `SessionDirectory` - Cache of known sessions plus the current-session pointer
//! - `FileDirectory` - Cache of one directory listing and its derived tree view
//!
//! Both treat server responses as authoritative: listings are replaced
//! wholesale, and nothing is committed locally when a call fails.

pub mod error;
pub mod files;
pub mod sessions;
pub mod status;

#[cfg(test)]
mod mock;

pub use error::DirectoryError;
pub use files::FileDirectory;
pub use sessions::SessionDirectory;
pub use status::DirectoryStatus;
