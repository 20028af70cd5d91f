//! Access to the auth cookie.
//!
//! The cookie carries the provider's bearer token. It is HTTP-only and
//! scoped to `/`; deletion emits a zero max-age cookie with the same path so
//! the browser drops the original rather than keeping an expired copy.

use amber_lantern_auth::{BearerToken, CookieChange};
use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::config::CookieConfig;

/// Reads the bearer token from the auth cookie.
///
/// A missing or blank cookie reads as no token.
pub fn read_token(jar: &CookieJar, name: &str) -> Option<BearerToken> {
    jar.get(name)
        .and_then(|cookie| BearerToken::from_raw(cookie.value()))
}

/// Builds the cookie that stores `token`.
pub fn token_cookie(config: &CookieConfig, token: &BearerToken) -> Cookie<'static> {
    Cookie::build((config.name.clone(), token.as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(config.max_age_days))
        .build()
}

/// Builds the cookie that deletes the auth cookie.
pub fn removal_cookie(config: &CookieConfig) -> Cookie<'static> {
    Cookie::build((config.name.clone(), ""))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::ZERO)
        .build()
}

/// Applies a resolver cookie decision to the response jar.
pub fn apply_change(jar: CookieJar, config: &CookieConfig, change: &CookieChange) -> CookieJar {
    match change {
        CookieChange::Unchanged => jar,
        CookieChange::Issue(token) => jar.add(token_cookie(config, token)),
        CookieChange::Replace { replacement } => {
            let jar = jar.remove(removal_cookie(config));
            match replacement {
                Some(token) => jar.add(token_cookie(config, token)),
                None => jar,
            }
        }
    }
}

/// Returns true if `headers` already set or delete the cookie called `name`.
pub fn response_sets(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value).ok())
        .any(|cookie| cookie.name() == name)
}
