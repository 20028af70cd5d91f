//! Server functions for identity and session management.
//!
//! Every call arrives through the resolver middleware, so the request already
//! carries a resolved [`RequestAuth`](crate::auth::RequestAuth). These
//! functions read it rather than touching the auth cookie themselves, except
//! where the session token changes and the cookie must follow.

use amber_lantern_auth::{BearerToken, Session};
use leptos::prelude::*;

use crate::types::{InitialAuth, UserInfo};

#[cfg(feature = "ssr")]
mod request {
    //! Access to per-request server state.

    use std::sync::Arc;

    use amber_lantern_auth::BearerToken;
    use axum::Extension;
    use axum::http::{HeaderValue, header};
    use leptos::prelude::*;
    use leptos_axum::ResponseOptions;

    use crate::auth::{AppState, CurrentAuth, RequestAuth, cookie};
    use crate::error::AuthApiError;

    pub(super) async fn app_state() -> Result<Arc<AppState>, ServerFnError> {
        let Extension(state): Extension<Arc<AppState>> = leptos_axum::extract()
            .await
            .map_err(|_| AuthApiError::StateUnavailable.into_server_error())?;
        Ok(state)
    }

    pub(super) async fn current_auth() -> Result<RequestAuth, ServerFnError> {
        let CurrentAuth(auth) = leptos_axum::extract().await?;
        Ok(auth)
    }

    pub(super) async fn require_token() -> Result<BearerToken, ServerFnError> {
        current_auth()
            .await?
            .token()
            .cloned()
            .ok_or_else(|| AuthApiError::NoToken.into_server_error())
    }

    /// Appends a Set-Cookie header to the server function response.
    fn set_cookie(value: String) -> Result<(), ServerFnError> {
        let header_value = HeaderValue::from_str(&value).map_err(|e| {
            let error = AuthApiError::CookieHeader {
                details: e.to_string(),
            };
            tracing::warn!(error = %error, "Failed to write auth cookie");
            error.into_server_error()
        })?;
        let response = use_context::<ResponseOptions>()
            .ok_or_else(|| AuthApiError::StateUnavailable.into_server_error())?;
        response.append_header(header::SET_COOKIE, header_value);
        Ok(())
    }

    /// Points the auth cookie at `token`, or deletes it.
    pub(super) fn store_token(
        state: &AppState,
        token: Option<&BearerToken>,
    ) -> Result<(), ServerFnError> {
        let cookie = match token {
            Some(token) => cookie::token_cookie(&state.cookie, token),
            None => cookie::removal_cookie(&state.cookie),
        };
        set_cookie(cookie.to_string())
    }
}

/// Returns the auth state for the initial page render.
#[server]
pub async fn get_initial_auth() -> Result<InitialAuth, ServerFnError> {
    let state = request::app_state().await?;
    let auth = request::current_auth().await?;

    Ok(InitialAuth {
        session: auth.session().cloned(),
        backend_disabled: state.backend_disabled,
    })
}

/// Returns the provider's current session for this client.
///
/// Uses the session resolved for this request when there is one; otherwise
/// asks the provider about the request's token, which may have been issued
/// by the resolver moments ago.
#[server]
pub async fn get_session() -> Result<Option<Session>, ServerFnError> {
    use crate::error::AuthApiError;

    let auth = request::current_auth().await?;
    if let Some(session) = auth.session() {
        return Ok(Some(session.clone()));
    }
    let Some(token) = auth.token() else {
        return Ok(None);
    };

    let state = request::app_state().await?;
    state.identity.session(token).await.map_err(|report| {
        let error = AuthApiError::from_provider(&report);
        tracing::debug!(error = %error, "Provider session lookup failed");
        error.into_server_error()
    })
}

/// Returns the current user as the backend sees it.
#[server]
pub async fn get_current_user() -> Result<Option<UserInfo>, ServerFnError> {
    use crate::error::AuthApiError;

    let auth = request::current_auth().await?;
    let Some(token) = auth.token() else {
        return Ok(None);
    };

    let state = request::app_state().await?;
    let user = state.backend.current_user(token).await.map_err(|report| {
        let error = AuthApiError::from_provider(&report);
        tracing::warn!(error = %error, "Current user query failed");
        error.into_server_error()
    })?;

    Ok(user.as_ref().map(UserInfo::from))
}

/// Mints a backend token for the current session.
#[server]
pub async fn fetch_backend_token() -> Result<Option<BearerToken>, ServerFnError> {
    use crate::error::AuthApiError;

    let token = request::require_token().await?;
    let state = request::app_state().await?;

    state.identity.backend_token(&token).await.map_err(|report| {
        let error = AuthApiError::from_provider(&report);
        tracing::debug!(error = %error, "Backend token fetch failed");
        error.into_server_error()
    })
}

/// Asks the backend whether it accepts `token`.
#[server]
pub async fn confirm_backend_auth(token: BearerToken) -> Result<bool, ServerFnError> {
    use crate::error::AuthApiError;

    let state = request::app_state().await?;
    state.backend.is_authenticated(&token).await.map_err(|report| {
        let error = AuthApiError::from_provider(&report);
        tracing::debug!(error = %error, "Backend authentication check failed");
        error.into_server_error()
    })
}

/// Redeems a cross-domain one-time token.
///
/// On success the auth cookie is pointed at the handed-over session and the
/// function returns true; an invalid or expired token returns false and
/// leaves the cookie alone.
#[server]
pub async fn redeem_handoff(one_time_token: String) -> Result<bool, ServerFnError> {
    let state = request::app_state().await?;

    let Some(session) = state.redeem_handoff(&one_time_token).await else {
        return Ok(false);
    };

    request::store_token(&state, Some(session.token()))?;
    tracing::info!(
        anonymous = session.is_anonymous(),
        "Session handed over via one-time token"
    );
    Ok(true)
}

/// Signs the current session out and starts a fresh anonymous one.
///
/// The new cookie takes precedence over whatever the resolver decided for
/// this request.
#[server]
pub async fn sign_out() -> Result<(), ServerFnError> {
    let state = request::app_state().await?;
    let auth = request::current_auth().await?;

    let replacement = state.replace_session(auth.token()).await;
    request::store_token(&state, replacement.as_ref())?;
    tracing::info!(reissued = replacement.is_some(), "Signed out");
    Ok(())
}
