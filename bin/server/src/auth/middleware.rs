//! Request resolver middleware and extractors for Axum.

use amber_lantern_auth::{BearerToken, Resolution, Session, resolve};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use super::{AppState, cookie};

/// Identity resolved for the current request.
///
/// Stored as a request extension by [`resolve_request_auth`]; handlers and
/// server functions read it through [`CurrentAuth`].
#[derive(Debug, Clone, Default)]
pub struct RequestAuth {
    session: Option<Session>,
    token: Option<BearerToken>,
}

impl RequestAuth {
    /// Returns the resolved session.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the token attached to backend calls for this request.
    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }
}

impl From<Resolution> for RequestAuth {
    fn from(resolution: Resolution) -> Self {
        let token = resolution.token().cloned();
        Self {
            session: resolution.into_session(),
            token,
        }
    }
}

/// Resolves the identity for every request outside the provider's routes.
///
/// Reads the auth cookie, runs the resolver against the identity provider
/// and backend, stores the outcome as a [`RequestAuth`] extension and
/// writes any cookie change onto the response. A handler that sets the auth
/// cookie itself, such as sign-out, has the last word: the resolver's change
/// is dropped so the browser never ends up with the older token.
#[tracing::instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn resolve_request_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if state.bypasses(request.uri().path()) {
        return next.run(request).await;
    }

    let cookie_token = cookie::read_token(&jar, &state.cookie.name);
    let resolution = resolve(
        cookie_token,
        state.identity.as_ref(),
        state.backend.as_ref(),
    )
    .await;

    let jar = cookie::apply_change(jar, &state.cookie, resolution.cookie());
    request
        .extensions_mut()
        .insert(RequestAuth::from(resolution));

    let response = next.run(request).await;
    if cookie::response_sets(response.headers(), &state.cookie.name) {
        tracing::debug!("Handler replaced the auth cookie, skipping resolver change");
        return response;
    }
    (jar, response).into_response()
}

/// Extractor for the identity resolved by [`resolve_request_auth`].
///
/// Routes that bypass resolution see an empty [`RequestAuth`].
pub struct CurrentAuth(pub RequestAuth);

impl<S> FromRequestParts<S> for CurrentAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentAuth(
            parts
                .extensions
                .get::<RequestAuth>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fakes::{KnownSessions, ScriptedProvider, anonymous_session, app_state};
    use axum::{
        Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode, header},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    async fn whoami(CurrentAuth(auth): CurrentAuth) -> String {
        match auth.session() {
            Some(session) => session.token().as_str().to_string(),
            None => format!(
                "none:{}",
                auth.token().map(BearerToken::as_str).unwrap_or("-")
            ),
        }
    }

    /// Stands in for a server function that swaps the session token.
    async fn reissue(CurrentAuth(auth): CurrentAuth) -> Response {
        let revoked = auth.token().map(BearerToken::as_str).unwrap_or("-").to_string();
        (
            [(header::SET_COOKIE, "session_token=T3; Path=/; HttpOnly")],
            revoked,
        )
            .into_response()
    }

    fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/", get(whoami))
            .route("/sign-out", get(reissue))
            .route("/api/auth/{*path}", get(whoami))
            .layer(middleware::from_fn_with_state(state, resolve_request_auth))
    }

    fn request(path: &str, cookie: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn first_visit_gets_an_anonymous_cookie() {
        let provider = Arc::new(ScriptedProvider::issuing(&["T1"]));
        let backend = KnownSessions::with(&[anonymous_session("T1")]);
        let app = router(app_state(provider.clone(), backend));

        let response = app.oneshot(request("/", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("session_token=T1"));
        assert!(cookies[0].contains("HttpOnly"));
        assert!(cookies[0].contains("Path=/"));
        assert_eq!(body_text(response).await, "T1");
        assert_eq!(provider.anonymous_calls(), 1);
    }

    #[tokio::test]
    async fn valid_cookie_passes_through_untouched() {
        let provider = Arc::new(ScriptedProvider::default());
        let backend = KnownSessions::with(&[anonymous_session("T0")]);
        let app = router(app_state(provider.clone(), backend));

        let response = app
            .oneshot(request("/", Some("session_token=T0")))
            .await
            .unwrap();

        assert!(set_cookies(&response).is_empty());
        assert_eq!(body_text(response).await, "T0");
        assert_eq!(provider.anonymous_calls(), 0);
    }

    #[tokio::test]
    async fn expired_cookie_is_replaced_and_session_left_empty() {
        let provider = Arc::new(ScriptedProvider::issuing(&["T2"]));
        let app = router(app_state(provider.clone(), KnownSessions::default()));

        let response = app
            .oneshot(request("/", Some("session_token=T_expired")))
            .await
            .unwrap();

        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("session_token=T2")));
        assert!(!cookies.iter().any(|c| c.contains("T_expired")));
        assert_eq!(body_text(response).await, "none:T2");
        assert_eq!(provider.anonymous_calls(), 1);
    }

    #[tokio::test]
    async fn expired_cookie_without_fallback_is_deleted() {
        let provider = Arc::new(ScriptedProvider::default());
        let app = router(app_state(provider, KnownSessions::default()));

        let response = app
            .oneshot(request("/", Some("session_token=stale")))
            .await
            .unwrap();

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("session_token=;"));
        assert!(cookies[0].contains("Max-Age=0"));
        assert_eq!(body_text(response).await, "none:-");
    }

    #[tokio::test]
    async fn provider_routes_skip_resolution() {
        let provider = Arc::new(ScriptedProvider::issuing(&["T1"]));
        let app = router(app_state(provider.clone(), KnownSessions::default()));

        let response = app
            .oneshot(request("/api/auth/get-session", None))
            .await
            .unwrap();

        assert!(set_cookies(&response).is_empty());
        assert_eq!(body_text(response).await, "none:-");
        assert_eq!(provider.anonymous_calls(), 0);
    }

    #[tokio::test]
    async fn handler_cookie_overrides_the_resolver_replacement() {
        let provider = Arc::new(ScriptedProvider::issuing(&["T2"]));
        let app = router(app_state(provider.clone(), KnownSessions::default()));

        let response = app
            .oneshot(request("/sign-out", Some("session_token=stale")))
            .await
            .unwrap();

        let cookies = set_cookies(&response);
        assert_eq!(cookies, vec!["session_token=T3; Path=/; HttpOnly".to_string()]);
        // The handler acted on the resolver's replacement token.
        assert_eq!(body_text(response).await, "T2");
        assert_eq!(provider.anonymous_calls(), 1);
    }
}
