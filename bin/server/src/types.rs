//! Shared types used across server functions and UI components.

use amber_lantern_auth::Session;

/// Auth state rendered into the initial page.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InitialAuth {
    /// Session resolved for the page request, if any.
    pub session: Option<Session>,
    /// Whether the client should skip backend authentication.
    pub backend_disabled: bool,
}

/// User info for display in the UI.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UserInfo {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub is_anonymous: bool,
}

impl UserInfo {
    /// Name shown in the header.
    pub fn label(&self) -> String {
        if self.is_anonymous {
            return "Guest".to_string();
        }
        self.display_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| "User".to_string())
    }
}

impl From<&amber_lantern_auth::SessionUser> for UserInfo {
    fn from(user: &amber_lantern_auth::SessionUser) -> Self {
        Self {
            display_name: user.name().map(str::to_string),
            email: user.email().map(str::to_string),
            is_anonymous: user.is_anonymous(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_lantern_auth::SessionUser;
    use amber_lantern_core::UserId;

    #[test]
    fn anonymous_users_are_labelled_guest() {
        let info = UserInfo::from(&SessionUser::anonymous(UserId::new("u1")));
        assert_eq!(info.label(), "Guest");
    }

    #[test]
    fn label_prefers_name_then_email() {
        let named = UserInfo::from(&SessionUser::registered(
            UserId::new("u1"),
            Some("Ada".to_string()),
            Some("ada@example.com".to_string()),
        ));
        assert_eq!(named.label(), "Ada");

        let unnamed = UserInfo::from(&SessionUser::registered(
            UserId::new("u2"),
            None,
            Some("bob@example.com".to_string()),
        ));
        assert_eq!(unnamed.label(), "bob@example.com");
    }
}
