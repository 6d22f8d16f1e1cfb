//! Assembled client.
//!
//! [`RemoteClient`] creates one [`ClientContext`] and hands its writer
//! handles to their owners: the token writer to the [`AuthGate`], the
//! selection writer to the [`SessionDirectory`].

use std::sync::Arc;

use remote_code_core::{
    ApiError, AuthApi, ClientContext, RejectionSink, TokenStore,
    model::{LoginRequest, LoginResponse},
};
use remote_code_session::{FileDirectory, SessionDirectory};
use remote_code_transport::SessionChannelBuilder;
use thiserror::Error;

use crate::{
    auth::AuthGate,
    config::{ClientConfig, ConfigError, Endpoints},
    http::ApiClient,
};

/// Client construction error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Everything needed to talk to one backend, wired to a single context.
pub struct RemoteClient {
    endpoints: Endpoints,
    context: ClientContext,
    auth: Arc<AuthGate>,
    api: Arc<ApiClient>,
    sessions: SessionDirectory<Arc<ApiClient>>,
    files: FileDirectory<Arc<ApiClient>>,
}

impl RemoteClient {
    /// Build a client from configuration and a token store.
    ///
    /// # Errors
    /// Returns error if the endpoints cannot be resolved.
    pub fn new(config: &ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let endpoints = config.resolve()?;
        let (context, writers) = ClientContext::new();
        let auth = Arc::new(AuthGate::new(context.clone(), writers.token, store));
        let api = Arc::new(ApiClient::new(&endpoints.api_base, Arc::clone(&auth))?);
        let sessions = SessionDirectory::new(Arc::clone(&api), context.clone(), writers.selection);
        let files = FileDirectory::new(Arc::clone(&api));
        tracing::debug!(api = %endpoints.api_base, ws = %endpoints.ws_base, "Client configured");

        Ok(Self {
            endpoints,
            context,
            auth,
            api,
            sessions,
            files,
        })
    }

    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    pub const fn context(&self) -> &ClientContext {
        &self.context
    }

    #[must_use]
    pub const fn auth(&self) -> &Arc<AuthGate> {
        &self.auth
    }

    #[must_use]
    pub const fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionDirectory<Arc<ApiClient>> {
        &self.sessions
    }

    #[must_use]
    pub const fn files(&self) -> &FileDirectory<Arc<ApiClient>> {
        &self.files
    }

    /// Log in and install the token.
    ///
    /// # Errors
    /// Returns the backend's error as is, including a 401.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let req = LoginRequest {
            username: username.to_owned(),
            password: password.to_owned(),
        };
        self.api.login(&req).await
    }

    pub fn logout(&self) {
        self.auth.logout();
    }

    /// Channel builder for `session`, wired to this client's context and
    /// reporting handshake rejections to the auth gate.
    #[must_use]
    pub fn channel(&self, session: &str) -> SessionChannelBuilder {
        SessionChannelBuilder::new(self.endpoints.ws_base.clone(), session, self.context.clone())
            .rejection_sink(Arc::clone(&self.auth) as Arc<dyn RejectionSink>)
    }
}
