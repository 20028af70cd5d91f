//! Bearer tokens and the backend token-fetch policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// An opaque bearer credential.
///
/// The same token authenticates against the identity provider and is
/// exchanged for backend tokens. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the value for an `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Parses a raw cookie or header value, ignoring blank values.
    #[must_use]
    pub fn from_raw(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Arguments the backend client passes when it asks for a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenFetchRequest {
    /// Set by the backend client when its cached token is missing or stale.
    pub force_refresh_token: bool,
}

impl TokenFetchRequest {
    /// A request asking for a freshly minted token.
    #[must_use]
    pub const fn forced() -> Self {
        Self {
            force_refresh_token: true,
        }
    }

    /// A request that accepts whatever the caller already has cached.
    #[must_use]
    pub const fn cached() -> Self {
        Self {
            force_refresh_token: false,
        }
    }
}

/// Token-fetch function handed to the backend client.
///
/// Without `force_refresh_token` this returns `None` and never calls `fetch`:
/// the backend client decides when a refresh is appropriate. With the flag it
/// runs `fetch` once; a failure is logged and reported as "no token" so the
/// backend client stays unauthenticated instead of surfacing an error.
pub async fn fetch_access_token<F, Fut, E>(
    request: TokenFetchRequest,
    fetch: F,
) -> Option<BearerToken>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<BearerToken>, E>>,
    E: fmt::Display,
{
    if !request.force_refresh_token {
        return None;
    }

    match fetch().await {
        Ok(token) => token,
        Err(error) => {
            tracing::debug!(error = %error, "Backend token fetch failed, reporting no token");
            None
        }
    }
}
