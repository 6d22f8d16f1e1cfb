//! Core abstractions for remote-code clients.
//!
//! This crate provides the fundamental building blocks:
//! - Data model shared with the session backend (`Session`, `FileEntry`, ...)
//! - `build_tree` - Flat listing to hierarchical tree nodes
//! - `ClientContext` - Explicit shared state with single-writer handles
//! - Collaborator traits for the REST surface and token storage

pub mod context;
pub mod error;
pub mod model;
pub mod traits;
pub mod tree;

pub use context::{ClientContext, ContextWriters, SelectionWriter, TokenWriter};
pub use error::{ApiError, StorageError};
pub use model::{FileEntry, FileKind, Session};
pub use traits::{AuthApi, FileApi, HealthApi, RejectionSink, SessionApi, TokenStore};
pub use tree::{FileTreeNode, build_tree};
