//! Client wiring for remote-code sessions.
//!
//! Provides:
//! - `ClientConfig` / `Endpoints` - API and WebSocket base resolution
//! - `AuthGate` - Credential token owner and login-boundary redirect
//! - `ApiClient` - REST implementation of the core API traits
//! - `TokenStore` implementations (memory, file)
//! - `RemoteClient` - Everything above assembled around one `ClientContext`

pub mod auth;
pub mod client;
pub mod config;
pub mod http;
pub mod storage;

pub use auth::{AuthGate, AuthState, CallKind};
pub use client::{ClientError, RemoteClient};
pub use config::{ClientConfig, ConfigError, Endpoints};
pub use http::ApiClient;
pub use storage::MemoryTokenStore;
#[cfg(feature = "file-store")]
pub use storage::FileTokenStore;
