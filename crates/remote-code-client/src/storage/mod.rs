//! Token storage implementations.

pub mod memory;

#[cfg(feature = "file-store")]
pub mod file;

#[cfg(feature = "file-store")]
pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;
