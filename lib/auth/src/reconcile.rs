//! Client-side reconciliation of the provider session and backend confirmation.
//!
//! Two sources report on the same identity and may update in any order:
//! the provider's session stream and the backend client's authentication
//! callback. The flags the UI reads are a pure function of the latest value
//! of each ([`AuthFlags::derive`]), never of the order the updates arrived in.
//!
//! When the snapshot is seeded from server-rendered data, the provider
//! stream commonly reports "no session" once before its own fetch completes.
//! [`SeedGate`] discards those reports until the stream has produced a
//! session of its own, so a valid server session is not downgraded.

use serde::{Deserialize, Serialize};

use crate::session::Session;

/// The backend service's view of the current token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendAuth {
    /// The backend has not reported yet.
    #[default]
    Unknown,
    /// The backend rejected the token or no token was available.
    Unauthenticated,
    /// The backend accepted the token.
    Authenticated,
}

impl BackendAuth {
    /// Returns true once the backend has reported either way.
    #[must_use]
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns true if the backend accepted the token.
    #[must_use]
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

impl From<bool> for BackendAuth {
    fn from(authenticated: bool) -> Self {
        if authenticated {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }
}

/// One update from the provider's session stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// The session, if the provider has one for this client.
    pub data: Option<Session>,
    /// True while the provider is still fetching.
    pub is_pending: bool,
}

impl SessionSnapshot {
    /// A snapshot taken while the provider is still fetching.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            data: None,
            is_pending: true,
        }
    }

    /// A settled snapshot.
    #[must_use]
    pub fn settled(data: Option<Session>) -> Self {
        Self {
            data,
            is_pending: false,
        }
    }
}

/// Whether stream updates may replace a server-seeded snapshot yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedGate {
    /// Seeded from server data; empty updates are discarded.
    SeededUnconfirmed,
    /// Every update is applied.
    Confirmed,
}

impl SeedGate {
    /// The initial gate state for a context seeded with `has_seed`.
    #[must_use]
    pub fn for_seed(has_seed: bool) -> Self {
        if has_seed {
            Self::SeededUnconfirmed
        } else {
            Self::Confirmed
        }
    }

    /// Decides whether `update` is applied, advancing the gate.
    ///
    /// The first update that carries a session confirms the stream.
    pub fn admit(&mut self, update: &SessionSnapshot) -> bool {
        match self {
            Self::Confirmed => true,
            Self::SeededUnconfirmed if update.data.is_none() => false,
            Self::SeededUnconfirmed => {
                *self = Self::Confirmed;
                true
            }
        }
    }

    /// Confirms the stream without a session update.
    ///
    /// Used when the user signs out: the following "no session" report is
    /// real and must not be discarded.
    pub fn confirm(&mut self) {
        *self = Self::Confirmed;
    }
}

/// The provider side of the context: latest admitted snapshot plus its gate.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderState {
    gate: SeedGate,
    snapshot: SessionSnapshot,
}

impl ProviderState {
    /// Creates the state, seeded with server data when available.
    ///
    /// Without a seed the state starts pending.
    #[must_use]
    pub fn new(initial: Option<Session>) -> Self {
        let gate = SeedGate::for_seed(initial.is_some());
        let snapshot = match initial {
            Some(session) => SessionSnapshot::settled(Some(session)),
            None => SessionSnapshot::pending(),
        };
        Self { gate, snapshot }
    }

    /// Applies a stream update; returns false if the gate discarded it.
    pub fn apply(&mut self, update: SessionSnapshot) -> bool {
        if !self.gate.admit(&update) {
            tracing::debug!("Discarding empty session update over server-seeded session");
            return false;
        }
        self.snapshot = update;
        true
    }

    /// Confirms the gate ahead of an explicit sign-out.
    pub fn confirm_sign_out(&mut self) {
        self.gate.confirm();
    }

    /// Returns the gate state.
    #[must_use]
    pub fn gate(&self) -> SeedGate {
        self.gate
    }

    /// Returns the current session.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.snapshot.data.as_ref()
    }

    /// Returns true while the provider session is still being fetched.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.snapshot.is_pending
    }

    /// Returns true if the provider reports a session.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.snapshot.data.is_some()
    }

    /// Derives the UI flags against the backend's current report.
    #[must_use]
    pub fn flags(&self, backend: BackendAuth) -> AuthFlags {
        AuthFlags::derive(self.is_pending(), self.is_authenticated(), backend)
    }
}

/// The loading/authenticated pair exposed to the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthFlags {
    pub is_loading: bool,
    pub is_authenticated: bool,
}

impl AuthFlags {
    /// Combines the provider and backend reports.
    ///
    /// Authentication needs both hops: the provider must report a session and
    /// the backend must have accepted the token. The context is loading while
    /// the provider is pending, or while the provider has a session the
    /// backend has not ruled on yet.
    #[must_use]
    pub fn derive(provider_pending: bool, provider_authenticated: bool, backend: BackendAuth) -> Self {
        Self {
            is_loading: provider_pending || (provider_authenticated && !backend.is_known()),
            is_authenticated: provider_authenticated && backend.is_authenticated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixtures::{anonymous_session, registered_session};

    #[derive(Clone, Copy, Debug)]
    enum ProviderCase {
        NoSession,
        Pending,
        Present,
    }

    fn provider_state(case: ProviderCase) -> ProviderState {
        match case {
            ProviderCase::NoSession => {
                let mut state = ProviderState::new(None);
                state.apply(SessionSnapshot::settled(None));
                state
            }
            ProviderCase::Pending => ProviderState::new(None),
            ProviderCase::Present => ProviderState::new(Some(anonymous_session("T1"))),
        }
    }

    #[test]
    fn is_authenticated_requires_both_sources() {
        let cases = [
            (ProviderCase::NoSession, BackendAuth::Unknown, false, false),
            (ProviderCase::NoSession, BackendAuth::Unauthenticated, false, false),
            (ProviderCase::NoSession, BackendAuth::Authenticated, false, false),
            (ProviderCase::Pending, BackendAuth::Unknown, true, false),
            (ProviderCase::Pending, BackendAuth::Unauthenticated, true, false),
            (ProviderCase::Pending, BackendAuth::Authenticated, true, false),
            (ProviderCase::Present, BackendAuth::Unknown, true, false),
            (ProviderCase::Present, BackendAuth::Unauthenticated, false, false),
            (ProviderCase::Present, BackendAuth::Authenticated, false, true),
        ];

        for (provider, backend, loading, authenticated) in cases {
            let flags = provider_state(provider).flags(backend);
            assert_eq!(
                flags,
                AuthFlags {
                    is_loading: loading,
                    is_authenticated: authenticated,
                },
                "provider {provider:?}, backend {backend:?}"
            );
        }
    }

    #[test]
    fn flags_do_not_depend_on_update_order() {
        let mut provider_first = ProviderState::new(None);
        provider_first.apply(SessionSnapshot::settled(Some(anonymous_session("T1"))));
        let backend = BackendAuth::from(true);
        let a = provider_first.flags(backend);

        let backend_first = BackendAuth::from(true);
        let mut state = ProviderState::new(None);
        assert!(state.flags(backend_first).is_loading);
        state.apply(SessionSnapshot::settled(Some(anonymous_session("T1"))));
        let b = state.flags(backend_first);

        assert_eq!(a, b);
        assert!(a.is_authenticated);
    }

    #[test]
    fn seeded_state_starts_settled() {
        let state = ProviderState::new(Some(anonymous_session("T1")));
        assert!(!state.is_pending());
        assert!(state.is_authenticated());
        assert_eq!(state.gate(), SeedGate::SeededUnconfirmed);
    }

    #[test]
    fn empty_updates_are_discarded_until_confirmed() {
        let seeded = anonymous_session("T1");
        let mut state = ProviderState::new(Some(seeded.clone()));

        assert!(!state.apply(SessionSnapshot::settled(None)));
        assert!(!state.apply(SessionSnapshot::pending()));
        assert_eq!(state.session(), Some(&seeded));
        assert!(!state.is_pending());
    }

    #[test]
    fn first_real_update_confirms_and_later_sign_outs_apply() {
        let mut state = ProviderState::new(Some(anonymous_session("T1")));
        let upgraded = registered_session("T2");

        assert!(state.apply(SessionSnapshot::settled(Some(upgraded.clone()))));
        assert_eq!(state.gate(), SeedGate::Confirmed);
        assert_eq!(state.session(), Some(&upgraded));

        assert!(state.apply(SessionSnapshot::settled(None)));
        assert!(!state.is_authenticated());
    }

    #[test]
    fn explicit_sign_out_confirms_the_gate() {
        let mut state = ProviderState::new(Some(registered_session("T1")));
        state.confirm_sign_out();

        assert!(state.apply(SessionSnapshot::settled(None)));
        assert!(state.session().is_none());
    }

    #[test]
    fn unseeded_state_applies_every_update() {
        let mut state = ProviderState::new(None);
        assert!(state.is_pending());
        assert!(state.apply(SessionSnapshot::settled(None)));
        assert!(!state.is_pending());
        assert!(!state.is_authenticated());
    }

    #[test]
    fn backend_auth_from_callback_value() {
        assert_eq!(BackendAuth::from(false), BackendAuth::Unauthenticated);
        assert!(BackendAuth::from(true).is_authenticated());
        assert!(!BackendAuth::default().is_known());
    }
}
