//! Capability levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A principal's capability level.
///
/// Ordered from least to most privileged. New identities start at
/// [`Role::User`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Ordinary customer
    #[default]
    User,
    /// Staff member handling leads, tasks and the catalog
    Sales,
    /// Administrator
    Admin,
}

impl Role {
    /// Every role, least privileged first
    pub const ALL: [Role; 3] = [Role::User, Role::Sales, Role::Admin];

    /// Roles allowed to manage the catalog and assign work
    pub const STAFF: [Role; 2] = [Role::Sales, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Sales => "sales",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "sales" => Ok(Role::Sales),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" Sales ".parse::<Role>().unwrap(), Role::Sales);
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err, Error::InvalidRole("superuser".to_string()));
    }

    #[test]
    fn test_default_is_lowest_privilege() {
        assert_eq!(Role::default(), Role::User);
        assert_eq!(Role::ALL.iter().min(), Some(&Role::User));
    }

    #[test]
    fn test_serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"sales\"").unwrap();
        assert_eq!(role, Role::Sales);
    }
}
