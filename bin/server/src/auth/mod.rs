//! Server-side authentication glue for amber-lantern.
//!
//! This module provides:
//! - The auth cookie accessor and cookie builders
//! - HTTP clients for the identity provider and the backend service
//! - The request resolver middleware and the [`CurrentAuth`] extractor
//! - A pass-through for the provider's own routes under the auth prefix
//!
//! The identity provider owns sessions; this server never stores them. Each
//! request is resolved against the backend service and falls back to an
//! anonymous identity, so every page render has a token to work with.

pub mod cookie;
pub mod http;
pub mod middleware;
pub mod proxy;
pub mod routes;

use amber_lantern_auth::{
    BackendService, BearerToken, IdentityProvider, ProviderError, ProviderResult, Session,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CookieConfig, ServerConfig};

pub use http::{HttpBackendClient, HttpIdentityProvider};
pub use middleware::{CurrentAuth, RequestAuth, resolve_request_auth};
pub use proxy::forward_to_provider;
pub use routes::with_request_auth;

/// Shared application state.
pub struct AppState {
    /// Issues and validates sessions.
    pub identity: Arc<dyn IdentityProvider>,
    /// Validates tokens independently of the provider.
    pub backend: Arc<dyn BackendService>,
    /// Forwards the provider's own routes.
    pub proxy: proxy::ProviderProxy,
    /// Auth cookie settings.
    pub cookie: CookieConfig,
    /// Whether the client should skip backend authentication.
    pub backend_disabled: bool,
    auth_route_prefix: String,
}

impl AppState {
    /// Creates application state from explicit collaborators.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        backend: Arc<dyn BackendService>,
        proxy: proxy::ProviderProxy,
        cookie: CookieConfig,
        auth_route_prefix: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            backend,
            proxy,
            cookie,
            backend_disabled: false,
            auth_route_prefix: normalize_prefix(auth_route_prefix.into()),
        }
    }

    /// Builds the HTTP collaborators described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured URL is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &ServerConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.identity.request_timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Configuration {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let identity = HttpIdentityProvider::new(client.clone(), &config.identity.base_url)?;
        let backend = HttpBackendClient::new(client.clone(), &config.backend.url)?;
        let proxy = proxy::ProviderProxy::new(client, identity.base_url().clone());

        let mut state = Self::new(
            Arc::new(identity),
            Arc::new(backend),
            proxy,
            config.cookie.clone(),
            config.auth_route_prefix.clone(),
        );
        state.backend_disabled = config.backend.disabled;
        Ok(state)
    }

    /// Returns the route prefix owned by the identity provider.
    pub fn auth_route_prefix(&self) -> &str {
        &self.auth_route_prefix
    }

    /// Returns true if `path` belongs to the identity provider's routes.
    ///
    /// Matching is per path segment: `/api/auth` and `/api/auth/session`
    /// match, `/api/authors` does not.
    pub fn bypasses(&self, path: &str) -> bool {
        let prefix = self.auth_route_prefix.as_str();
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Redeems a cross-domain one-time token for the session it hands over.
    ///
    /// The caller points the auth cookie at the returned session's token.
    pub async fn redeem_handoff(&self, one_time_token: &str) -> Option<Session> {
        amber_lantern_auth::redeem_one_time_token(self.identity.as_ref(), one_time_token).await
    }

    /// Revokes `current` and starts a fresh anonymous identity.
    ///
    /// A failed revocation is logged and does not stop the replacement.
    /// Returns the token the auth cookie should hold next, or `None` when the
    /// provider issued nothing and the cookie should be deleted.
    pub async fn replace_session(&self, current: Option<&BearerToken>) -> Option<BearerToken> {
        if let Some(token) = current {
            if let Err(report) = self.identity.sign_out(token).await {
                tracing::warn!(
                    error = %report,
                    network = report.current_context().is_network(),
                    "Provider sign-out failed, dropping cookie anyway"
                );
            }
        }
        amber_lantern_auth::sign_in_anonymous(self.identity.as_ref()).await
    }
}

fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory collaborators for middleware and handler tests.

    use amber_lantern_auth::{
        BackendService, BearerToken, IdentityProvider, ProviderError, ProviderResult, Session,
        SessionInfo, SessionUser,
    };
    use amber_lantern_core::{SessionId, UserId};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use super::{AppState, proxy::ProviderProxy};
    use crate::config::CookieConfig;

    pub(crate) fn anonymous_session(token: &str) -> Session {
        Session::new(
            SessionInfo::new(
                SessionId::new(format!("session-{token}")),
                UserId::new(format!("user-{token}")),
                BearerToken::new(token),
                chrono::Duration::days(7),
            ),
            SessionUser::anonymous(UserId::new(format!("user-{token}"))),
        )
    }

    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        pub(crate) issued: Mutex<VecDeque<BearerToken>>,
        pub(crate) sessions: HashMap<String, Session>,
        pub(crate) one_time_tokens: HashMap<String, BearerToken>,
        pub(crate) anonymous_calls: Mutex<usize>,
        pub(crate) signed_out: Mutex<Vec<String>>,
        pub(crate) sign_out_unreachable: bool,
    }

    impl ScriptedProvider {
        pub(crate) fn issuing(tokens: &[&str]) -> Self {
            Self {
                issued: Mutex::new(tokens.iter().map(|t| BearerToken::new(*t)).collect()),
                ..Self::default()
            }
        }

        pub(crate) fn anonymous_calls(&self) -> usize {
            *self.anonymous_calls.lock().unwrap()
        }

        pub(crate) fn signed_out(&self) -> Vec<String> {
            self.signed_out.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityProvider for ScriptedProvider {
        async fn sign_in_anonymous(&self) -> ProviderResult<Option<BearerToken>> {
            *self.anonymous_calls.lock().unwrap() += 1;
            Ok(self.issued.lock().unwrap().pop_front())
        }

        async fn session(
            &self,
            token: &BearerToken,
        ) -> ProviderResult<Option<Session>> {
            Ok(self.sessions.get(token.as_str()).cloned())
        }

        async fn backend_token(
            &self,
            token: &BearerToken,
        ) -> ProviderResult<Option<BearerToken>> {
            Ok(Some(BearerToken::new(format!("jwt-{}", token.as_str()))))
        }

        async fn verify_one_time_token(
            &self,
            one_time_token: &str,
        ) -> ProviderResult<Option<BearerToken>> {
            Ok(self.one_time_tokens.get(one_time_token).cloned())
        }

        async fn sign_out(&self, token: &BearerToken) -> ProviderResult<()> {
            if self.sign_out_unreachable {
                return Err(ProviderError::Network {
                    endpoint: "api/auth/sign-out".to_string(),
                    reason: "connection refused".to_string(),
                }
                .into());
            }
            self.signed_out
                .lock()
                .unwrap()
                .push(token.as_str().to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct KnownSessions {
        pub(crate) sessions: HashMap<String, Session>,
    }

    impl KnownSessions {
        pub(crate) fn with(sessions: &[Session]) -> Self {
            Self {
                sessions: sessions
                    .iter()
                    .map(|s| (s.token().as_str().to_string(), s.clone()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl BackendService for KnownSessions {
        async fn current_session(
            &self,
            token: &BearerToken,
        ) -> ProviderResult<Option<Session>> {
            Ok(self.sessions.get(token.as_str()).cloned())
        }

        async fn current_user(
            &self,
            token: &BearerToken,
        ) -> ProviderResult<Option<SessionUser>> {
            Ok(self.sessions.get(token.as_str()).map(|s| s.user().clone()))
        }

        async fn is_authenticated(
            &self,
            token: &BearerToken,
        ) -> ProviderResult<bool> {
            Ok(self.sessions.contains_key(token.as_str()))
        }
    }

    pub(crate) fn app_state(
        provider: Arc<ScriptedProvider>,
        backend: KnownSessions,
    ) -> Arc<AppState> {
        let proxy = ProviderProxy::new(
            reqwest::Client::new(),
            url::Url::parse("http://identity.invalid").unwrap(),
        );
        let cookie = CookieConfig {
            secure: false,
            ..CookieConfig::default()
        };
        Arc::new(AppState::new(
            provider,
            Arc::new(backend),
            proxy,
            cookie,
            "/api/auth",
        ))
    }
}
