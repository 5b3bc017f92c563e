use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::UserId,
};

/// Account resolved from an identity token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
}

/// Token plus the account it belongs to, handed to each store call
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub user_id: UserId,
}

/// Resolves an identity token into an account
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SessionSource: Send + Sync {
    async fn resolve(&self, token: &str) -> AppResult<Identity>;
}

/// Resolves identities through the store's profile endpoint
pub struct HttpSessionSource {
    http_client: HttpClient,
    api_base: String,
}

impl HttpSessionSource {
    pub fn new(http_client: HttpClient, api_base: String) -> Self {
        Self {
            http_client,
            api_base,
        }
    }
}

#[async_trait::async_trait]
impl SessionSource for HttpSessionSource {
    async fn resolve(&self, token: &str) -> AppResult<Identity> {
        let url = format!("{}/api/profile", self.api_base);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::read_transport("fetch profile", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_read_status("fetch profile", status, body));
        }

        response
            .json::<Identity>()
            .await
            .map_err(|e| AppError::read_transport("fetch profile", e))
    }
}

#[derive(Default)]
struct SessionInner {
    token: Option<String>,
    identity: Option<Identity>,
}

/// Explicit session context shared by the store adapters
///
/// Created once at startup, re-initialized whenever the identity token changes.
/// Adapters read the current credentials on every call, so a refresh is picked up
/// without rebuilding them.
#[derive(Clone)]
pub struct Session {
    source: Arc<dyn SessionSource>,
    inner: Arc<RwLock<SessionInner>>,
}

impl Session {
    /// Session with no identity; every store call fails with `NotAuthenticated`
    pub fn anonymous(source: Arc<dyn SessionSource>) -> Self {
        Self {
            source,
            inner: Arc::new(RwLock::new(SessionInner::default())),
        }
    }

    /// Session for a token whose account is already known
    pub fn preauthenticated(source: Arc<dyn SessionSource>, token: String, user_id: UserId) -> Self {
        Self {
            source,
            inner: Arc::new(RwLock::new(SessionInner {
                token: Some(token),
                identity: Some(Identity { user_id }),
            })),
        }
    }

    /// App-start initialization
    pub async fn init(source: Arc<dyn SessionSource>, token: Option<String>) -> AppResult<Self> {
        let session = Self::anonymous(source);
        session.set_identity(token).await?;
        Ok(session)
    }

    /// Replaces the token and resolves its account
    ///
    /// On failure the session is left anonymous rather than holding a stale identity.
    pub async fn set_identity(&self, token: Option<String>) -> AppResult<Option<Identity>> {
        let Some(token) = token else {
            self.clear().await;
            return Ok(None);
        };

        match self.source.resolve(&token).await {
            Ok(identity) => {
                tracing::info!(user_id = %identity.user_id, "Session identity resolved");
                let mut inner = self.inner.write().await;
                inner.token = Some(token);
                inner.identity = Some(identity.clone());
                Ok(Some(identity))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve session identity");
                self.clear().await;
                Err(e)
            }
        }
    }

    /// Re-resolves the current token
    pub async fn refresh(&self) -> AppResult<Option<Identity>> {
        let token = self.inner.read().await.token.clone();
        self.set_identity(token).await
    }

    /// Sign-out
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.token = None;
        inner.identity = None;
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.inner
            .read()
            .await
            .identity
            .as_ref()
            .map(|i| i.user_id.clone())
    }

    /// Current credentials, or `NotAuthenticated` without touching the network
    pub async fn credentials(&self) -> AppResult<Credentials> {
        let inner = self.inner.read().await;
        match (&inner.token, &inner.identity) {
            (Some(token), Some(identity)) => Ok(Credentials {
                token: token.clone(),
                user_id: identity.user_id.clone(),
            }),
            _ => Err(AppError::NotAuthenticated(
                "no active session".to_string(),
            )),
        }
    }
}
