//! Endpoint configuration.
//!
//! The API base is resolved in priority order: an explicit URL, then a
//! configured backend port, then the page origin, then the local default.
//! The WebSocket base is explicit or derived from the API base.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Port the backend listens on by default.
pub const DEFAULT_BACKEND_PORT: u16 = 9090;

const DEFAULT_HOST: &str = "http://localhost";
const API_PATH: &str = "/api";

pub const ENV_API_URL: &str = "REMOTE_CODE_API_URL";
pub const ENV_WS_URL: &str = "REMOTE_CODE_WS_URL";
pub const ENV_BACKEND_PORT: &str = "REMOTE_CODE_BACKEND_PORT";
pub const ENV_ORIGIN: &str = "REMOTE_CODE_ORIGIN";

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Invalid backend port: {0}")]
    InvalidPort(String),
}

/// Raw endpoint inputs. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Full API base, e.g. `https://host/api`.
    pub api_url: Option<String>,
    /// Full WebSocket base, e.g. `wss://host/api`.
    pub ws_url: Option<String>,
    pub backend_port: Option<u16>,
    /// Origin the client is served from, e.g. `https://host:8443`.
    pub origin: Option<String>,
}

/// Resolved base URLs, without trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub ws_base: String,
}

impl ClientConfig {
    /// Read the `REMOTE_CODE_*` environment variables.
    ///
    /// # Errors
    /// Returns error if the port variable is not a valid port.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    ///
    /// # Errors
    /// Returns error if the port value is not a valid port.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let backend_port = get(ENV_BACKEND_PORT)
            .map(|port| {
                port.parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or(ConfigError::InvalidPort(port))
            })
            .transpose()?;

        Ok(Self {
            api_url: get(ENV_API_URL),
            ws_url: get(ENV_WS_URL),
            backend_port,
            origin: get(ENV_ORIGIN),
        })
    }

    /// Resolve the API and WebSocket bases.
    ///
    /// # Errors
    /// Returns error if a configured URL is invalid.
    pub fn resolve(&self) -> Result<Endpoints, ConfigError> {
        let api_base = self.api_base()?;
        let ws_base = match &self.ws_url {
            Some(url) => validate(url)?,
            None => to_ws(&api_base),
        };
        Ok(Endpoints { api_base, ws_base })
    }

    fn api_base(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.api_url {
            return validate(url);
        }
        if let Some(port) = self.backend_port {
            let host = self.origin.as_deref().unwrap_or(DEFAULT_HOST);
            let mut url = parse(host)?;
            url.set_port(Some(port)).map_err(|()| ConfigError::InvalidUrl {
                url: host.to_owned(),
                reason: "cannot carry a port".to_owned(),
            })?;
            url.set_path(API_PATH);
            return Ok(trim(url.as_str()));
        }
        if let Some(origin) = &self.origin {
            let origin = validate(origin)?;
            return Ok(format!("{origin}{API_PATH}"));
        }
        Ok(format!("{DEFAULT_HOST}:{DEFAULT_BACKEND_PORT}{API_PATH}"))
    }
}

fn parse(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}

fn validate(url: &str) -> Result<String, ConfigError> {
    parse(url)?;
    Ok(trim(url))
}

fn trim(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}

fn to_ws(api_base: &str) -> String {
    if let Some(rest) = api_base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_base.to_owned()
    }
}
