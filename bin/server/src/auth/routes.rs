//! Auth routing: the provider pass-through and where resolution applies.

use axum::{Router, extract::FromRef, middleware, routing::any};
use std::sync::Arc;

use super::{AppState, forward_to_provider, resolve_request_auth};

/// Adds the provider's routes to `router` and resolves auth on every route
/// registered so far.
///
/// Resolution is a route layer: routes, nested services and the fallback
/// added to the returned router afterwards never see it, so static assets
/// don't trigger anonymous sign-ins. Both the bare prefix and everything
/// beneath it go to the provider.
pub fn with_request_auth<S>(router: Router<S>, state: Arc<AppState>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Arc<AppState>: FromRef<S>,
{
    let prefix = state.auth_route_prefix().to_string();
    router
        .route(&prefix, any(forward_to_provider))
        .route(&format!("{prefix}/{{*path}}"), any(forward_to_provider))
        .route_layer(middleware::from_fn_with_state(state, resolve_request_auth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fakes::{KnownSessions, ScriptedProvider, anonymous_session, app_state};
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        routing::get,
    };
    use tower::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        let pages = Router::new().route("/", get(|| async { "home" }));
        with_request_auth(pages, state.clone())
            .nest(
                "/pkg",
                Router::new().route("/{*file}", get(|| async { "asset" })),
            )
            .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
            .with_state(state)
    }

    fn get_request(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn static_assets_skip_resolution() {
        let provider = Arc::new(ScriptedProvider::issuing(&["A1", "A2", "A3"]));
        let state = app_state(provider.clone(), KnownSessions::default());

        for path in ["/pkg/amber-lantern.js", "/pkg/amber-lantern.css", "/favicon.ico"] {
            let response = app(state.clone()).oneshot(get_request(path)).await.unwrap();
            assert!(response.headers().get(header::SET_COOKIE).is_none(), "{path}");
        }
        assert_eq!(provider.anonymous_calls(), 0);
    }

    #[tokio::test]
    async fn pages_are_resolved() {
        let provider = Arc::new(ScriptedProvider::issuing(&["T1"]));
        let state = app_state(
            provider.clone(),
            KnownSessions::with(&[anonymous_session("T1")]),
        );

        let response = app(state).oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().starts_with("session_token=T1"));
        assert_eq!(provider.anonymous_calls(), 1);
    }

    #[tokio::test]
    async fn bare_prefix_reaches_the_provider() {
        let provider = Arc::new(ScriptedProvider::default());
        let state = app_state(provider.clone(), KnownSessions::default());

        // An oversized body is refused by the pass-through before any
        // upstream call, which shows the route is registered.
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth")
            .body(Body::from(vec![b'x'; 2 * 1024 * 1024]))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(provider.anonymous_calls(), 0);
    }

    #[tokio::test]
    async fn dot_segments_under_the_prefix_are_rejected() {
        let provider = Arc::new(ScriptedProvider::default());
        let state = app_state(provider.clone(), KnownSessions::default());

        let response = app(state)
            .oneshot(get_request("/api/auth/../../admin"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.anonymous_calls(), 0);
    }
}
