//! Cross-domain session handoff via one-time tokens.
//!
//! Another origin hands a session over by redirecting here with `?ott=...`.
//! The browser side strips the parameter before anything else so a reload
//! or back-navigation can never present the token twice; redemption happens
//! on the server against the identity provider.

use tracing::debug;
use url::Url;

use crate::provider::IdentityProvider;
use crate::session::Session;

/// Query parameter carrying the one-time token.
pub const ONE_TIME_TOKEN_PARAM: &str = "ott";

/// A handoff found in the current URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHandoff {
    /// The token to redeem; `None` if the parameter was present but blank.
    pub token: Option<String>,
    /// The URL with every `ott` parameter removed.
    pub cleaned_url: Url,
}

/// Looks for a one-time token in `href`.
///
/// Returns `None` when the URL does not carry the parameter (or is not a
/// URL at all), in which case nothing must be rewritten.
#[must_use]
pub fn detect_handoff(href: &str) -> Option<PendingHandoff> {
    let mut url = Url::parse(href).ok()?;

    let mut found = false;
    let mut token = None;
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(key, value)| {
            if key == ONE_TIME_TOKEN_PARAM {
                found = true;
                if token.is_none() && !value.trim().is_empty() {
                    token = Some(value.into_owned());
                }
                None
            } else {
                Some((key.into_owned(), value.into_owned()))
            }
        })
        .collect();

    if !found {
        return None;
    }

    if retained.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(retained);
    }

    Some(PendingHandoff {
        token,
        cleaned_url: url,
    })
}

/// Redeems a one-time token and fetches the session it stands for.
///
/// The session token returned by verification is used as the bearer
/// credential for the session lookup. Any failure yields `None`: a
/// malformed or expired token only skips the handoff.
pub async fn redeem_one_time_token<P>(provider: &P, one_time_token: &str) -> Option<Session>
where
    P: IdentityProvider + ?Sized,
{
    let session_token = match provider.verify_one_time_token(one_time_token).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            debug!("One-time token was not accepted");
            return None;
        }
        Err(error) => {
            debug!(error = %error, "One-time token verification failed");
            return None;
        }
    };

    match provider.session(&session_token).await {
        Ok(session) => session,
        Err(error) => {
            debug!(error = %error, "Session lookup after handoff failed");
            None
        }
    }
}
