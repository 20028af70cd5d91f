//! Connection state for the backend service.

use std::fmt::Display;
use std::future::Future;

use amber_lantern_auth::{BearerToken, TokenFetchRequest};
use leptos::prelude::*;
use leptos::task::spawn_local;

/// Tracks the token the backend service accepted for this page.
///
/// Each call to [`BackendConnection::set_auth`] supersedes the previous one:
/// a late answer for an older token never overwrites a newer result.
#[derive(Clone, Copy)]
pub struct BackendConnection {
    disabled: bool,
    token: RwSignal<Option<BearerToken>>,
    generation: StoredValue<u64>,
}

impl BackendConnection {
    /// Creates a connection; a disabled one never authenticates.
    pub fn new(disabled: bool) -> Self {
        Self {
            disabled,
            token: RwSignal::new(None),
            generation: StoredValue::new(0),
        }
    }

    /// The token the backend last accepted.
    pub fn token(&self) -> Option<BearerToken> {
        self.token.get()
    }

    /// Authenticates with tokens from `fetch_token`, reporting through `on_change`.
    ///
    /// The fetcher is asked for a cached token first, then for a forced
    /// refresh. Without a token the connection reports unauthenticated;
    /// otherwise `confirm` asks the backend to decide.
    pub fn set_auth<F, Fut, K, KFut, E, C>(&self, fetch_token: F, confirm: K, on_change: C)
    where
        F: Fn(TokenFetchRequest) -> Fut + 'static,
        Fut: Future<Output = Option<BearerToken>> + 'static,
        K: Fn(BearerToken) -> KFut + 'static,
        KFut: Future<Output = Result<bool, E>> + 'static,
        E: Display + 'static,
        C: Fn(bool) + 'static,
    {
        if self.disabled {
            return;
        }

        let generation = self.next_generation();
        spawn_local(self.authenticate(generation, fetch_token, confirm, on_change));
    }

    async fn authenticate<F, Fut, K, KFut, E, C>(
        self,
        generation: u64,
        fetch_token: F,
        confirm: K,
        on_change: C,
    ) where
        F: Fn(TokenFetchRequest) -> Fut,
        Fut: Future<Output = Option<BearerToken>>,
        K: Fn(BearerToken) -> KFut,
        KFut: Future<Output = Result<bool, E>>,
        E: Display,
        C: Fn(bool),
    {
        let token = match fetch_token(TokenFetchRequest::cached()).await {
            Some(token) => Some(token),
            None => fetch_token(TokenFetchRequest::forced()).await,
        };

        let accepted = match token {
            Some(token) => match confirm(token.clone()).await {
                Ok(true) => Some(token),
                Ok(false) => None,
                Err(error) => {
                    tracing::debug!(error = %error, "Backend rejected authentication");
                    None
                }
            },
            None => None,
        };

        if self.is_current(generation) {
            let authenticated = accepted.is_some();
            self.token.set(accepted);
            on_change(authenticated);
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.update_value(|generation| *generation += 1);
        self.generation.get_value()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.get_value() == generation
    }
}
