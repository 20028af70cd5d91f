//! Session records as returned by the identity provider.
//!
//! A [`Session`] pairs provider session metadata with the user it belongs
//! to. The provider enriches the user with application fields before the
//! record reaches the client; those are carried verbatim in
//! [`SessionUser::app_fields`].

use amber_lantern_core::{SessionId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::token::BearerToken;

/// Provider-side session metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    id: SessionId,
    user_id: UserId,
    token: BearerToken,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Creates session metadata valid for `duration` from now.
    #[must_use]
    pub fn new(id: SessionId, user_id: UserId, token: BearerToken, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            token,
            created_at: now,
            expires_at: now + duration,
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the owning user's ID.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the session's bearer token.
    #[must_use]
    pub fn token(&self) -> &BearerToken {
        &self.token
    }

    /// Returns when the session was issued.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// The principal a session belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    id: UserId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    is_anonymous: bool,
    /// Application-specific fields added by the provider's session enrichment.
    #[serde(flatten)]
    app_fields: BTreeMap<String, Value>,
}

impl SessionUser {
    /// Creates an anonymous user with no profile data.
    #[must_use]
    pub fn anonymous(id: UserId) -> Self {
        Self {
            id,
            name: None,
            email: None,
            is_anonymous: true,
            app_fields: BTreeMap::new(),
        }
    }

    /// Creates a user with durable credentials.
    #[must_use]
    pub fn registered(id: UserId, name: Option<String>, email: Option<String>) -> Self {
        Self {
            id,
            name,
            email,
            is_anonymous: false,
            app_fields: BTreeMap::new(),
        }
    }

    /// Returns the user's ID.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the email address, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns true for implicitly created anonymous identities.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }

    /// Returns the application fields.
    #[must_use]
    pub fn app_fields(&self) -> &BTreeMap<String, Value> {
        &self.app_fields
    }

    /// Returns one application field.
    #[must_use]
    pub fn app_field(&self, key: &str) -> Option<&Value> {
        self.app_fields.get(key)
    }
}

/// A resolved session: metadata plus the user it authenticates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    session: SessionInfo,
    user: SessionUser,
}

impl Session {
    /// Creates a session record.
    #[must_use]
    pub fn new(session: SessionInfo, user: SessionUser) -> Self {
        Self { session, user }
    }

    /// Returns the session metadata.
    #[must_use]
    pub fn info(&self) -> &SessionInfo {
        &self.session
    }

    /// Returns the user.
    #[must_use]
    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    /// Returns the session's bearer token.
    #[must_use]
    pub fn token(&self) -> &BearerToken {
        self.session.token()
    }

    /// Returns true if the principal is anonymous.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user.is_anonymous()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn anonymous_session(token: &str) -> Session {
        let user = SessionUser::anonymous(UserId::new(format!("user-{token}")));
        let info = SessionInfo::new(
            SessionId::new(format!("sess-{token}")),
            user.id().clone(),
            BearerToken::new(token),
            Duration::days(7),
        );
        Session::new(info, user)
    }

    pub(crate) fn registered_session(token: &str) -> Session {
        let user = SessionUser::registered(
            UserId::new(format!("user-{token}")),
            Some("Ada".to_string()),
            Some("ada@example.com".to_string()),
        );
        let info = SessionInfo::new(
            SessionId::new(format!("sess-{token}")),
            user.id().clone(),
            BearerToken::new(token),
            Duration::days(7),
        );
        Session::new(info, user)
    }
}
