//! Domain error types for server functions.
//!
//! Server functions log the full error and hand the client a user-safe
//! message through [`AuthApiError::into_server_error`].

use amber_lantern_auth::ProviderError;
use leptos::server_fn::error::ServerFnError;
use rootcause::prelude::Report;
use std::fmt;

/// Errors raised while serving auth server functions.
#[derive(Debug)]
pub enum AuthApiError {
    /// Application state was not attached to the request.
    StateUnavailable,
    /// The request carries no token to act on.
    NoToken,
    /// The identity provider or backend could not be reached.
    Unreachable { details: String },
    /// The identity provider or backend answered with an error.
    Upstream { details: String },
    /// The response cookie could not be written.
    CookieHeader { details: String },
}

impl fmt::Display for AuthApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateUnavailable => write!(f, "application state not available"),
            Self::NoToken => write!(f, "request carries no session token"),
            Self::Unreachable { details } => write!(f, "upstream unreachable: {}", details),
            Self::Upstream { details } => write!(f, "upstream error: {}", details),
            Self::CookieHeader { details } => {
                write!(f, "failed to write auth cookie: {}", details)
            }
        }
    }
}

impl AuthApiError {
    /// Classifies a collaborator failure by whether it reached the service.
    pub fn from_provider(report: &Report<ProviderError>) -> Self {
        let error = report.current_context();
        if error.is_network() {
            Self::Unreachable {
                details: report.to_string(),
            }
        } else {
            Self::Upstream {
                details: report.to_string(),
            }
        }
    }

    /// Convert to a user-safe ServerFnError.
    pub fn into_server_error(self) -> ServerFnError {
        match &self {
            AuthApiError::StateUnavailable => ServerFnError::new("Server misconfigured"),
            AuthApiError::NoToken => ServerFnError::new("Not signed in"),
            AuthApiError::Unreachable { .. } => {
                ServerFnError::new("Authentication service unavailable")
            }
            AuthApiError::Upstream { .. } => ServerFnError::new("Authentication service error"),
            AuthApiError::CookieHeader { .. } => ServerFnError::new("Failed to update session"),
        }
    }
}
