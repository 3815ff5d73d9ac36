//! The conversation partner as the dialog engine sees it.

use crate::id::UserId;
use serde::{Deserialize, Serialize};

/// A user the bot talks to.
///
/// `formal_address` selects between the formal and informal register when
/// templates render second-person pronouns. Handlers may flip it mid-turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identity of the user.
    pub id: UserId,
    /// Display name, if the transport knows one.
    pub first_name: Option<String>,
    /// Whether the user is addressed formally ("Sie") or informally ("du").
    pub formal_address: bool,
    /// Whether administrative commands are permitted.
    pub is_admin: bool,
}

impl User {
    /// Creates a user with default preferences (formal address, no admin rights).
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            first_name: None,
            formal_address: true,
            is_admin: false,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = Some(name.into());
        self
    }

    /// Sets the address register.
    #[must_use]
    pub fn with_formal_address(mut self, formal: bool) -> Self {
        self.formal_address = formal;
        self
    }

    /// Grants administrative rights.
    #[must_use]
    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_addressed_formally() {
        let user = User::new(UserId::new());
        assert!(user.formal_address);
        assert!(!user.is_admin);
        assert!(user.first_name.is_none());
    }

    #[test]
    fn builder_sets_fields() {
        let user = User::new(UserId::new())
            .with_first_name("Ada")
            .with_formal_address(false)
            .as_admin();
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert!(!user.formal_address);
        assert!(user.is_admin);
    }
}
