//! Reactive auth context shared by the UI.
//!
//! The context combines two reports on the same identity: the identity
//! provider's session and the backend service's confirmation of the token.
//! Components read [`AuthContext::is_loading`] and
//! [`AuthContext::is_authenticated`], which are derived from the latest value
//! of each report and never from the order in which they arrived.
//!
//! ```ignore
//! #[component]
//! fn Status() -> impl IntoView {
//!     let auth = use_auth_context();
//!     move || if auth.is_loading() { "Loading" } else { "Ready" }
//! }
//! ```

mod backend;
mod handoff;

use amber_lantern_auth::{
    AuthFlags, BackendAuth, BearerToken, ProviderState, Session, SessionSnapshot,
    TokenFetchRequest,
};
use amber_lantern_core::SessionId;
use leptos::prelude::*;
use leptos::task::spawn_local;

pub use backend::BackendConnection;
pub use handoff::use_one_time_token;

use crate::user::{confirm_backend_auth, fetch_backend_token, get_session, sign_out};

/// Options for [`provide_auth_context`].
#[derive(Clone, Debug, Default)]
pub struct AuthContextOptions {
    /// Session resolved on the server for the initial render.
    pub initial: Option<Session>,
    /// Skip handing the token fetcher to the backend.
    pub backend_disabled: bool,
}

/// Auth state for the current page.
#[derive(Clone, Copy)]
pub struct AuthContext {
    provider: RwSignal<ProviderState>,
    backend: RwSignal<BackendAuth>,
    flags: Memo<AuthFlags>,
    connection: BackendConnection,
}

impl AuthContext {
    fn new(options: AuthContextOptions) -> Self {
        let provider = RwSignal::new(ProviderState::new(options.initial));
        let backend = RwSignal::new(BackendAuth::Unknown);
        let flags = Memo::new(move |_| provider.with(|state| state.flags(backend.get())));

        Self {
            provider,
            backend,
            flags,
            connection: BackendConnection::new(options.backend_disabled),
        }
    }

    /// True while either report is still outstanding.
    pub fn is_loading(&self) -> bool {
        self.flags.get().is_loading
    }

    /// True once the provider has a session and the backend accepted it.
    pub fn is_authenticated(&self) -> bool {
        self.flags.get().is_authenticated
    }

    /// Both flags at once.
    pub fn flags(&self) -> AuthFlags {
        self.flags.get()
    }

    /// The provider's current session.
    pub fn session(&self) -> Option<Session> {
        self.provider.with(|state| state.session().cloned())
    }

    /// The backend connection this context drives.
    pub fn connection(&self) -> BackendConnection {
        self.connection
    }

    /// Applies one update from the provider's session stream.
    ///
    /// Returns false if the update was discarded in favor of the server seed.
    pub fn apply_session_update(&self, update: SessionSnapshot) -> bool {
        let mut applied = false;
        self.provider.maybe_update(|state| {
            applied = state.apply(update);
            applied
        });
        applied
    }

    /// Records the backend's authentication callback.
    pub fn set_backend_auth(&self, authenticated: bool) {
        self.backend.set(BackendAuth::from(authenticated));
    }

    /// Re-reads the provider session.
    pub fn refresh_session(&self) {
        let ctx = *self;
        spawn_local(async move {
            let update = match get_session().await {
                Ok(session) => SessionSnapshot::settled(session),
                Err(error) => {
                    tracing::debug!(error = %error, "Session refresh failed");
                    SessionSnapshot::settled(None)
                }
            };
            ctx.apply_session_update(update);
        });
    }

    /// Fetches a backend access token for the current session.
    ///
    /// Returns `None` without a network call unless `request` forces a
    /// refresh; fetch failures are swallowed.
    pub async fn fetch_access_token(&self, request: TokenFetchRequest) -> Option<BearerToken> {
        amber_lantern_auth::fetch_access_token(request, fetch_backend_token).await
    }

    /// Hands the token fetcher to the backend connection.
    ///
    /// The connection reports back through [`Self::set_backend_auth`].
    pub fn authenticate_backend(&self) {
        let ctx = *self;
        self.connection.set_auth(
            move |request| async move { ctx.fetch_access_token(request).await },
            confirm_backend_auth,
            move |authenticated| ctx.set_backend_auth(authenticated),
        );
    }

    /// Signs out and re-authenticates against the fresh anonymous session.
    pub fn sign_out(&self) {
        let ctx = *self;
        self.provider.update(ProviderState::confirm_sign_out);
        spawn_local(async move {
            if let Err(error) = sign_out().await {
                tracing::warn!(error = %error, "Sign-out failed");
            }
            ctx.refresh_session();
        });
    }

    fn session_id(&self) -> Option<SessionId> {
        self.provider
            .with(|state| state.session().map(|session| session.info().id().clone()))
    }
}

/// Creates the auth context and makes it available to descendants.
///
/// Starts the provider session subscription, hands the token fetcher to the
/// backend whenever the session identity changes, and installs the one-time
/// token handler. The session is re-read whenever the window regains focus,
/// so a sign-in or expiry in another tab shows up here.
pub fn provide_auth_context(options: AuthContextOptions) -> AuthContext {
    let ctx = AuthContext::new(options);
    provide_context(ctx);

    // Effects only run in the browser: the session subscription starts once
    // the page is interactive.
    Effect::new(move || ctx.refresh_session());

    Effect::new(move |previous: Option<Option<SessionId>>| {
        let current = ctx.session_id();
        if previous.as_ref() != Some(&current) {
            ctx.authenticate_backend();
        }
        current
    });

    refresh_on_focus(ctx);
    use_one_time_token(ctx);
    ctx
}

fn refresh_on_focus(ctx: AuthContext) {
    #[cfg(feature = "hydrate")]
    {
        let listener = window_event_listener(leptos::ev::focus, move |_| ctx.refresh_session());
        on_cleanup(move || listener.remove());
    }

    #[cfg(not(feature = "hydrate"))]
    let _ = ctx;
}

/// Returns the auth context provided by an ancestor.
///
/// # Panics
///
/// Panics when called outside a component tree set up by
/// [`provide_auth_context`].
pub fn use_auth_context() -> AuthContext {
    use_context::<AuthContext>()
        .expect("auth context is missing: call provide_auth_context() in an ancestor component")
}
