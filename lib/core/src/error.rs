//! Shared `Result` alias.
//!
//! Errors in amber-lantern are domain enums wrapped in a rootcause `Report`.
//! Library code returns `Report<DomainError>` so callers at the web layer can
//! log the full chain and then degrade to "no session".

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
