//! Error types for the auth crate.
//!
//! Errors are designed for layered context using rootcause. None of them
//! ever reach a page render: the resolver and the client context degrade
//! every failure to "no session" and only log the report.

use std::fmt;

/// Result of a call to the identity provider or backend service.
pub type ProviderResult<T> = amber_lantern_core::Result<T, ProviderError>;

/// Errors from calls to the identity provider or the backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request never produced a response (connect failure, timeout, reset).
    Network { endpoint: String, reason: String },
    /// The collaborator answered with a non-success HTTP status.
    Rejected { endpoint: String, status: u16 },
    /// The response body did not have the expected shape.
    Decode { endpoint: String, reason: String },
    /// The backend service executed the query and reported an error.
    Query { path: String, message: String },
    /// Client configuration is unusable (bad base URL, etc.).
    Configuration { reason: String },
}

impl ProviderError {
    /// Returns true when the failure happened below HTTP (no response at all).
    ///
    /// Network failures are expected while offline and are logged at a lower
    /// level than rejections, which usually indicate a misconfiguration.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { endpoint, reason } => {
                write!(f, "network error calling '{endpoint}': {reason}")
            }
            Self::Rejected { endpoint, status } => {
                write!(f, "'{endpoint}' rejected the request with status {status}")
            }
            Self::Decode { endpoint, reason } => {
                write!(f, "unexpected response from '{endpoint}': {reason}")
            }
            Self::Query { path, message } => {
                write!(f, "backend query '{path}' failed: {message}")
            }
            Self::Configuration { reason } => {
                write!(f, "invalid client configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}
