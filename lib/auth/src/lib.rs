//! Session reconciliation for amber-lantern.
//!
//! Three sources answer "who is logged in": the identity provider's session,
//! the backend service's own validation of the token, and the anonymous
//! identity the server falls back to. This crate holds the logic that keeps
//! them consistent, independent of any web framework:
//!
//! - [`resolver`]: per-request resolution with the anonymous fallback
//! - [`reconcile`]: the client-side state machine and derived flags
//! - [`handoff`]: cross-domain one-time token handling
//! - [`token`]: bearer tokens and the backend token-fetch policy
//!
//! # Example
//!
//! ```
//! use amber_lantern_auth::{AuthFlags, BackendAuth, ProviderState, SessionSnapshot};
//!
//! // Nothing seeded from the server: the context starts pending.
//! let mut provider = ProviderState::new(None);
//! assert!(provider.flags(BackendAuth::Unknown).is_loading);
//!
//! // The provider settles with no session.
//! provider.apply(SessionSnapshot::settled(None));
//! assert_eq!(
//!     provider.flags(BackendAuth::Unauthenticated),
//!     AuthFlags { is_loading: false, is_authenticated: false },
//! );
//! ```

pub mod error;
pub mod handoff;
pub mod provider;
pub mod reconcile;
pub mod resolver;
pub mod session;
pub mod token;

pub use error::{ProviderError, ProviderResult};
pub use handoff::{ONE_TIME_TOKEN_PARAM, PendingHandoff, detect_handoff, redeem_one_time_token};
pub use provider::{BackendService, IdentityProvider};
pub use reconcile::{AuthFlags, BackendAuth, ProviderState, SeedGate, SessionSnapshot};
pub use resolver::{CookieChange, Resolution, resolve, sign_in_anonymous};
pub use session::{Session, SessionInfo, SessionUser};
pub use token::{BearerToken, TokenFetchRequest, fetch_access_token};
