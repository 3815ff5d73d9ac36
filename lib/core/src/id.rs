//! Strongly-typed identifiers.
//!
//! Identifiers are ULIDs rendered with a short type prefix (`usr_01H...`).
//! Transport layers that only know a platform-specific peer id map it onto a
//! [`UserId`] once and keep that mapping; the dialog engine never sees the
//! platform id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when an identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// Name of the identifier type that was being parsed.
    pub id_type: &'static str,
    /// What went wrong.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Generates a ULID-backed identifier type with a display prefix.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Display prefix of this identifier type.
            pub const PREFIX: &'static str = $prefix;

            /// Generates a fresh identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Wraps an existing ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the wrapped ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .strip_prefix(Self::PREFIX)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .unwrap_or(s);

                Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    reason: e.to_string(),
                })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }
    };
}

define_id!(
    /// Identifies a conversation partner. Exactly one dialog context exists per user id.
    UserId,
    "usr"
);

define_id!(
    /// Identifies one incoming update (a message, a command or a media upload).
    UpdateId,
    "upd"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_renders_with_prefix() {
        assert!(UserId::new().to_string().starts_with("usr_"));
        assert!(UpdateId::new().to_string().starts_with("upd_"));
    }

    #[test]
    fn prefixed_and_bare_forms_parse_to_the_same_id() {
        let id = UserId::new();
        let prefixed: UserId = id.to_string().parse().expect("prefixed should parse");
        let bare: UserId = id.as_ulid().to_string().parse().expect("bare should parse");
        assert_eq!(prefixed, id);
        assert_eq!(bare, id);
    }

    #[test]
    fn garbage_is_rejected_with_type_name() {
        let err = "usr_nope".parse::<UserId>().expect_err("should not parse");
        assert_eq!(err.id_type, "UserId");
        assert!(err.to_string().starts_with("invalid UserId"));
    }

    #[test]
    fn ids_order_by_creation_time() {
        let earlier = UserId::from_ulid(Ulid::from_parts(1_000, 7));
        let later = UserId::from_ulid(Ulid::from_parts(2_000, 3));
        assert!(earlier < later);
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));
    }
}
