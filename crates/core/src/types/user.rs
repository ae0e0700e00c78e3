//! Signed-in user records.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// The identity returned by the backend for the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Normalized user identifier.
    pub id: UserId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Account email address.
    #[serde(default)]
    pub email: String,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl User {
    /// Name to greet the user with, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    /// Merge a partial profile update into this record.
    pub fn apply(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = Some(phone);
        }
    }
}

/// Partial profile fields. `None` leaves the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: UserId::new("u1"),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_apply_only_touches_given_fields() {
        let mut user = user();
        user.apply(ProfilePatch {
            phone: Some("+91 98765 43210".to_string()),
            ..ProfilePatch::default()
        });

        assert_eq!(user.name, "Asha");
        assert_eq!(user.email, "asha@example.com");
        assert_eq!(user.phone.as_deref(), Some("+91 98765 43210"));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut user = user();
        assert_eq!(user.display_name(), "Asha");

        user.name.clear();
        assert_eq!(user.display_name(), "asha@example.com");
    }
}
