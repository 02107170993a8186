use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access level of an account. Stored as its lowercase name.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "moderator")]
    Moderator,
    #[default]
    #[sea_orm(string_value = "user")]
    User,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown role '{0}', expected one of: admin, moderator, user")]
pub struct UnknownRole(pub String);

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::User => "user",
        }
    }

    /// Parses a role name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Result<Self, UnknownRole> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "user" => Ok(Self::User),
            _ => Err(UnknownRole(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_parse_known_roles() {
        assert_eq!(Role::parse("admin"), Ok(Role::Admin));
        assert_eq!(Role::parse(" Moderator "), Ok(Role::Moderator));
        assert_eq!(Role::parse("USER"), Ok(Role::User));
    }

    #[test]
    fn test_parse_rejects_unknown_role() {
        let err = Role::parse("superuser").unwrap_err();
        assert_eq!(err, UnknownRole("superuser".to_string()));
        assert!(err.to_string().contains("superuser"));
    }

    #[test]
    fn test_as_str_matches_stored_value() {
        for role in Role::iter() {
            assert_eq!(role.to_value(), role.as_str());
            assert_eq!(Role::parse(role.as_str()), Ok(role));
        }
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Role::Moderator).unwrap();
        assert_eq!(json, "\"moderator\"");

        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
