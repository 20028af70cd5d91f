//! Request-scoped identity resolution.
//!
//! Every request outside the provider's own routes leaves here with a
//! resolution attempt completed: the cookie token if the backend accepts it,
//! otherwise a fresh anonymous identity. At most two anonymous sign-ins are
//! attempted per request (missing cookie, then one fallback after a rejected
//! token) and the session is queried at most once.

use tracing::{debug, instrument, warn};

use crate::provider::{BackendService, IdentityProvider};
use crate::session::Session;
use crate::token::BearerToken;

/// How the auth cookie must change on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieChange {
    /// Leave the cookie as the browser sent it.
    Unchanged,
    /// No cookie was sent; set this freshly issued token.
    Issue(BearerToken),
    /// The token was rejected: delete the cookie, then set the replacement
    /// if the anonymous fallback produced one.
    Replace { replacement: Option<BearerToken> },
}

/// Outcome of resolving one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    session: Option<Session>,
    token: Option<BearerToken>,
    cookie: CookieChange,
    anonymous_sign_ins: u8,
}

impl Resolution {
    /// The session stored in request-local state, if one resolved.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Consumes the resolution, returning the session.
    #[must_use]
    pub fn into_session(self) -> Option<Session> {
        self.session
    }

    /// The token attached to the backend client for the rest of the request.
    #[must_use]
    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    /// The cookie change to apply to the response.
    #[must_use]
    pub fn cookie(&self) -> &CookieChange {
        &self.cookie
    }

    /// How many anonymous sign-ins were performed.
    #[must_use]
    pub fn anonymous_sign_ins(&self) -> u8 {
        self.anonymous_sign_ins
    }
}

/// Result of the single session query a request is allowed.
enum SessionLookup {
    Found(Session),
    Rejected,
    Unavailable,
}

/// Requests a fresh anonymous identity.
///
/// Failures are logged and reported as `None`; the caller proceeds without a
/// session rather than failing the request.
pub async fn sign_in_anonymous<P>(provider: &P) -> Option<BearerToken>
where
    P: IdentityProvider + ?Sized,
{
    match provider.sign_in_anonymous().await {
        Ok(Some(token)) => {
            debug!("Issued anonymous identity");
            Some(token)
        }
        Ok(None) => {
            warn!("Identity provider issued no token for anonymous sign-in");
            None
        }
        Err(error) => {
            warn!(
                error = %error,
                network = error.current_context().is_network(),
                "Anonymous sign-in failed, continuing without a session"
            );
            None
        }
    }
}

async fn lookup_session<B>(backend: &B, token: &BearerToken) -> SessionLookup
where
    B: BackendService + ?Sized,
{
    match backend.current_session(token).await {
        Ok(Some(session)) => SessionLookup::Found(session),
        Ok(None) => SessionLookup::Rejected,
        Err(error) => {
            warn!(
                error = %error,
                network = error.current_context().is_network(),
                "Session query failed, continuing without a session"
            );
            SessionLookup::Unavailable
        }
    }
}

/// Resolves the identity for one request.
///
/// `cookie_token` is the raw token read from the auth cookie. A backend that
/// cannot be reached leaves the cookie untouched: only a definitive "no
/// session" answer clears it.
#[instrument(skip_all, fields(has_cookie = cookie_token.is_some()))]
pub async fn resolve<P, B>(
    cookie_token: Option<BearerToken>,
    provider: &P,
    backend: &B,
) -> Resolution
where
    P: IdentityProvider + ?Sized,
    B: BackendService + ?Sized,
{
    let mut anonymous_sign_ins = 0;

    let (token, from_cookie) = match cookie_token {
        Some(token) => (Some(token), true),
        None => {
            anonymous_sign_ins += 1;
            (sign_in_anonymous(provider).await, false)
        }
    };

    let Some(token) = token else {
        return Resolution {
            session: None,
            token: None,
            cookie: CookieChange::Unchanged,
            anonymous_sign_ins,
        };
    };

    match lookup_session(backend, &token).await {
        SessionLookup::Found(session) => {
            debug!(anonymous = session.is_anonymous(), "Resolved session");
            let cookie = if from_cookie {
                CookieChange::Unchanged
            } else {
                CookieChange::Issue(token.clone())
            };
            Resolution {
                session: Some(session),
                token: Some(token),
                cookie,
                anonymous_sign_ins,
            }
        }
        SessionLookup::Unavailable => Resolution {
            session: None,
            cookie: if from_cookie {
                CookieChange::Unchanged
            } else {
                CookieChange::Issue(token.clone())
            },
            token: Some(token),
            anonymous_sign_ins,
        },
        SessionLookup::Rejected => {
            debug!("Token rejected, clearing cookie and signing in anonymously");
            anonymous_sign_ins += 1;
            let replacement = sign_in_anonymous(provider).await;
            Resolution {
                session: None,
                token: replacement.clone(),
                cookie: CookieChange::Replace { replacement },
                anonymous_sign_ins,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::fakes::{FakeBackend, FakeProvider};
    use crate::session::fixtures::anonymous_session;

    #[tokio::test]
    async fn missing_cookie_issues_anonymous_token_and_resolves_it() {
        let t1 = anonymous_session("T1");
        let provider = FakeProvider::new().issuing("T1");
        let backend = FakeBackend::new().knowing(t1.clone());

        let resolution = resolve(None, &provider, &backend).await;

        assert_eq!(resolution.session(), Some(&t1));
        assert_eq!(resolution.token(), Some(&BearerToken::new("T1")));
        assert_eq!(
            resolution.cookie(),
            &CookieChange::Issue(BearerToken::new("T1"))
        );
        assert_eq!(resolution.anonymous_sign_ins(), 1);
        assert_eq!(backend.queried_tokens(), vec!["T1".to_string()]);
    }

    #[tokio::test]
    async fn valid_cookie_is_kept_without_signing_in() {
        let session = anonymous_session("T0");
        let provider = FakeProvider::new();
        let backend = FakeBackend::new().knowing(session.clone());

        let resolution = resolve(Some(BearerToken::new("T0")), &provider, &backend).await;

        assert_eq!(resolution.session(), Some(&session));
        assert_eq!(resolution.cookie(), &CookieChange::Unchanged);
        assert_eq!(provider.anonymous_calls(), 0);
    }

    #[tokio::test]
    async fn expired_cookie_is_replaced_by_exactly_one_fallback() {
        let provider = FakeProvider::new().issuing("T2");
        let backend = FakeBackend::new();

        let resolution = resolve(Some(BearerToken::new("T_expired")), &provider, &backend).await;

        assert!(resolution.session().is_none());
        assert_eq!(resolution.token(), Some(&BearerToken::new("T2")));
        assert_eq!(
            resolution.cookie(),
            &CookieChange::Replace {
                replacement: Some(BearerToken::new("T2"))
            }
        );
        assert_eq!(provider.anonymous_calls(), 1);
        assert_eq!(backend.queried_tokens(), vec!["T_expired".to_string()]);
    }

    #[tokio::test]
    async fn rejected_fresh_token_stops_after_second_sign_in() {
        let provider = FakeProvider::new().issuing("T1").issuing("T2");
        let backend = FakeBackend::new();

        let resolution = resolve(None, &provider, &backend).await;

        assert_eq!(resolution.anonymous_sign_ins(), 2);
        assert_eq!(provider.anonymous_calls(), 2);
        assert_eq!(backend.queried_tokens().len(), 1);
        assert_eq!(resolution.token(), Some(&BearerToken::new("T2")));
    }

    #[tokio::test]
    async fn failed_anonymous_sign_in_degrades_to_no_session() {
        let provider = FakeProvider::new().failing(ProviderError::Network {
            endpoint: "/api/auth/sign-in/anonymous".to_string(),
            reason: "timed out".to_string(),
        });
        let backend = FakeBackend::new();

        let resolution = resolve(None, &provider, &backend).await;

        assert!(resolution.session().is_none());
        assert!(resolution.token().is_none());
        assert_eq!(resolution.cookie(), &CookieChange::Unchanged);
        assert!(backend.queried_tokens().is_empty());
    }

    #[tokio::test]
    async fn failed_fallback_still_deletes_the_stale_cookie() {
        let provider = FakeProvider::new().failing(ProviderError::Rejected {
            endpoint: "/api/auth/sign-in/anonymous".to_string(),
            status: 503,
        });
        let backend = FakeBackend::new();

        let resolution = resolve(Some(BearerToken::new("stale")), &provider, &backend).await;

        assert_eq!(
            resolution.cookie(),
            &CookieChange::Replace { replacement: None }
        );
        assert!(resolution.token().is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_keeps_the_cookie() {
        let provider = FakeProvider::new();
        let backend = FakeBackend::new().unreachable();

        let resolution = resolve(Some(BearerToken::new("T0")), &provider, &backend).await;

        assert!(resolution.session().is_none());
        assert_eq!(resolution.cookie(), &CookieChange::Unchanged);
        assert_eq!(resolution.token(), Some(&BearerToken::new("T0")));
        assert_eq!(provider.anonymous_calls(), 0);
    }
}
