//! REST client for the session backend.
//!
//! Implements the core API traits over HTTP. Every request goes through
//! [`ApiClient::send`], which attaches the bearer token from the
//! [`AuthGate`] and reports 401 responses back to it.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use remote_code_core::{
    ApiError, AuthApi, FileApi, FileEntry, HealthApi, Session, SessionApi,
    model::{
        CreateFileRequest, CreateSessionRequest, FileContent, FileListing, HealthStatus,
        LoginRequest, LoginResponse, OutputLines, PageRequest, RenameFileRequest,
        SendCommandRequest, SessionOutput, TokenValidation,
    },
};
use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
use serde::{Deserialize, de::DeserializeOwned};
use url::Url;

use crate::auth::{AuthGate, CallKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP implementation of the backend API.
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    auth: Arc<AuthGate>,
}

impl ApiClient {
    /// Create a client for `api_base` (e.g. `http://host:9090/api`).
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(api_base: &str, auth: Arc<AuthGate>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Self::with_client(http, api_base, auth)
    }

    /// Create a client around an existing `reqwest::Client`.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid.
    pub fn with_client(
        http: reqwest::Client,
        api_base: &str,
        auth: Arc<AuthGate>,
    ) -> Result<Self, ApiError> {
        let base = Url::parse(api_base.trim_end_matches('/'))
            .map_err(|e| ApiError::Transport(format!("invalid API base {api_base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Transport(format!("invalid API base {api_base}")));
        }
        Ok(Self { http, base, auth })
    }

    #[must_use]
    pub const fn auth(&self) -> &Arc<AuthGate> {
        &self.auth
    }

    /// `{base}/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.http.request(method, self.endpoint(segments))
    }

    /// Attach credentials, send, and map failures.
    async fn send(&self, builder: RequestBuilder, kind: CallKind) -> Result<Response, ApiError> {
        let token = self.auth.token();
        let builder = match &token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            tracing::warn!("Request failed: {e}");
            ApiError::Transport(e.to_string())
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response, status).await;
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(?kind, "Request unauthorized: {message}");
            self.auth.reject(kind, token.as_deref());
            return Err(ApiError::Unauthorized { message });
        }
        tracing::warn!(status = status.as_u16(), "Request rejected: {message}");
        Err(ApiError::Request {
            status: status.as_u16(),
            message,
        })
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(builder, CallKind::Authenticated).await?;
        decode(response).await
    }

    async fn call_empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        self.send(builder, CallKind::Authenticated).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// `{"error": "..."}` body, raw text, or the status reason.
async fn error_message(response: Response, status: StatusCode) -> String {
    let text = response.text().await.unwrap_or_default();
    if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
        return body.error;
    }
    let text = text.trim();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_owned()
    } else {
        text.to_owned()
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

#[async_trait]
impl SessionApi for ApiClient {
    async fn list(&self) -> Result<Vec<Session>, ApiError> {
        self.call(self.request(Method::GET, &["sessions"])).await
    }

    async fn get(&self, name: &str) -> Result<Session, ApiError> {
        self.call(self.request(Method::GET, &["sessions", name])).await
    }

    async fn create(&self, req: &CreateSessionRequest) -> Result<Session, ApiError> {
        self.call(self.request(Method::POST, &["sessions"]).json(req))
            .await
    }

    async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.call_empty(self.request(Method::DELETE, &["sessions", name]))
            .await
    }

    async fn output(&self, name: &str) -> Result<SessionOutput, ApiError> {
        self.call(self.request(Method::GET, &["sessions", name, "output"]))
            .await
    }

    async fn send_command(&self, name: &str, req: &SendCommandRequest) -> Result<(), ApiError> {
        self.call_empty(
            self.request(Method::POST, &["sessions", name, "command"])
                .json(req),
        )
        .await
    }

    async fn stream_output(&self, name: &str, lines: u32) -> Result<OutputLines, ApiError> {
        self.call(
            self.request(Method::GET, &["sessions", name, "stream"])
                .query(&[("lines", lines)]),
        )
        .await
    }
}

#[async_trait]
impl FileApi for ApiClient {
    async fn list(&self, path: &str, page: Option<PageRequest>) -> Result<FileListing, ApiError> {
        let mut builder = self.request(Method::GET, &["files"]).query(&[("path", path)]);
        if let Some(page) = page {
            builder = builder.query(&[("page", page.page), ("pageSize", page.page_size)]);
        }
        self.call(builder).await
    }

    async fn content(&self, path: &str) -> Result<FileContent, ApiError> {
        let builder = self
            .request(Method::GET, &["files", "content"])
            .query(&[("path", path)]);
        let response = self.send(builder, CallKind::Authenticated).await?;
        if is_json(&response) {
            return decode(response).await;
        }
        let content = response
            .text()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(FileContent {
            path: path.to_owned(),
            size: content.len() as u64,
            content,
            mod_time: None,
        })
    }

    async fn create(&self, req: &CreateFileRequest) -> Result<FileEntry, ApiError> {
        self.call(self.request(Method::POST, &["files"]).json(req))
            .await
    }

    async fn rename(&self, req: &RenameFileRequest) -> Result<FileEntry, ApiError> {
        self.call(self.request(Method::PUT, &["files", "rename"]).json(req))
            .await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.call_empty(
            self.request(Method::DELETE, &["files"])
                .query(&[("path", path)]),
        )
        .await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    /// Log in and, on success, install the returned token.
    async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let builder = self.request(Method::POST, &["auth", "login"]).json(req);
        let response = self.send(builder, CallKind::Login).await?;
        let login: LoginResponse = decode(response).await?;
        self.auth.login_succeeded(&login.token);
        tracing::info!(username = %login.username, "Authenticated");
        Ok(login)
    }

    async fn validate(&self) -> Result<TokenValidation, ApiError> {
        self.call(self.request(Method::GET, &["auth", "validate"]))
            .await
    }
}

#[async_trait]
impl HealthApi for ApiClient {
    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.call(self.request(Method::GET, &["health"])).await
    }
}
