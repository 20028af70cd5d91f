//! Collaborator contracts for the identity provider and backend service.
//!
//! Neither collaborator is implemented here. The web server supplies HTTP
//! clients; tests supply in-memory fakes.

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::session::{Session, SessionUser};
use crate::token::BearerToken;

/// The service that issues and validates sessions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates an anonymous identity and returns its session token.
    ///
    /// `Ok(None)` means the provider answered but issued no token.
    async fn sign_in_anonymous(&self) -> ProviderResult<Option<BearerToken>>;

    /// Looks up the session a token belongs to.
    async fn session(&self, token: &BearerToken)
    -> ProviderResult<Option<Session>>;

    /// Mints a backend-service token for the session behind `token`.
    async fn backend_token(
        &self,
        token: &BearerToken,
    ) -> ProviderResult<Option<BearerToken>>;

    /// Redeems a cross-domain one-time token, returning the session token it
    /// stands for.
    async fn verify_one_time_token(
        &self,
        one_time_token: &str,
    ) -> ProviderResult<Option<BearerToken>>;

    /// Revokes the session behind `token`.
    async fn sign_out(&self, token: &BearerToken) -> ProviderResult<()>;
}

/// The data-layer service that validates tokens independently.
#[async_trait]
pub trait BackendService: Send + Sync {
    /// Runs the current-session query with `token` attached.
    async fn current_session(
        &self,
        token: &BearerToken,
    ) -> ProviderResult<Option<Session>>;

    /// Runs the current-user query with `token` attached.
    async fn current_user(
        &self,
        token: &BearerToken,
    ) -> ProviderResult<Option<SessionUser>>;

    /// Asks whether the backend accepts `token`.
    async fn is_authenticated(&self, token: &BearerToken) -> ProviderResult<bool>;
}
