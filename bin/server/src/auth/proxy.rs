//! Pass-through for the identity provider's own routes.
//!
//! Requests under the auth route prefix skip session resolution and are
//! forwarded to the provider unchanged, so the browser can talk to the
//! provider on this origin and receive its cookies first-party.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use std::sync::Arc;
use url::Url;

use super::AppState;

/// Largest request body forwarded upstream.
const MAX_FORWARDED_BODY: usize = 1024 * 1024;

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: [header::HeaderName; 6] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
];

/// Forwards requests to the identity provider.
#[derive(Debug, Clone)]
pub struct ProviderProxy {
    client: Client,
    upstream: Url,
}

impl ProviderProxy {
    /// Creates a proxy that forwards to `upstream`.
    pub fn new(client: Client, upstream: Url) -> Self {
        Self { client, upstream }
    }

    /// Resolves the upstream URL for a request path and query.
    ///
    /// Paths with `.` or `..` segments are refused: joining would resolve
    /// them and could reach provider routes outside the auth prefix.
    fn target(&self, path_and_query: &str) -> Option<Url> {
        let path = path_and_query
            .split_once('?')
            .map_or(path_and_query, |(path, _)| path);
        if path.split('/').any(is_dot_segment) {
            return None;
        }
        self.upstream
            .join(path_and_query.trim_start_matches('/'))
            .ok()
    }
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

fn forwardable(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Handler for every route under the auth prefix.
pub async fn forward_to_provider(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let Some(target) = state.proxy.target(path_and_query) else {
        tracing::warn!(path = %path_and_query, "Could not build provider URL");
        return (StatusCode::BAD_REQUEST, "Invalid auth route").into_response();
    };

    let body = match to_bytes(body, MAX_FORWARDED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected oversized auth request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let upstream = state
        .proxy
        .client
        .request(parts.method, target)
        .headers(forwardable(&parts.headers))
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Identity provider unreachable");
            return (StatusCode::BAD_GATEWAY, "Identity provider unreachable").into_response();
        }
    };

    let status = upstream.status();
    let headers = forwardable(upstream.headers());
    match upstream.bytes().await {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read identity provider response");
            (StatusCode::BAD_GATEWAY, "Identity provider error").into_response()
        }
    }
}
