//! Access policy guard
//!
//! Every authorization decision in the backend is made here, from decoded
//! session claims and static parameters supplied by the caller. Nothing in
//! this module performs I/O or mutates state.

use crate::{Error, Result, Role, SessionClaims};

/// Outcome of a policy check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    fn from_bool(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    /// Turn a denial into [`Error::Forbidden`]
    pub fn require(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(Error::Forbidden),
        }
    }
}

/// Allow the principal itself, or any administrator
pub fn can_access_own_or_admin(claims: &SessionClaims, target_id: &str) -> Decision {
    Decision::from_bool(claims.sub == target_id || claims.role == Role::Admin)
}

/// Allow administrators only
pub fn can_access_admin_only(claims: &SessionClaims) -> Decision {
    Decision::from_bool(claims.role == Role::Admin)
}

/// Allow any principal whose role is in `allowed_roles`
pub fn can_access_role_set(claims: &SessionClaims, allowed_roles: &[Role]) -> Decision {
    Decision::from_bool(allowed_roles.contains(&claims.role))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(id: &str, role: Role) -> SessionClaims {
        SessionClaims {
            sub: id.to_string(),
            email: format!("{}@example.com", id),
            role,
            verified: true,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn test_own_resource_allowed_for_any_role() {
        for role in Role::ALL {
            assert_eq!(can_access_own_or_admin(&claims("u1", role), "u1"), Decision::Allow);
        }
    }

    #[test]
    fn test_other_resource_denied_for_user() {
        assert_eq!(can_access_own_or_admin(&claims("u1", Role::User), "u2"), Decision::Deny);
        assert_eq!(can_access_own_or_admin(&claims("u1", Role::Sales), "u2"), Decision::Deny);
    }

    #[test]
    fn test_admin_allowed_for_any_target() {
        let admin = claims("root", Role::Admin);
        assert_eq!(can_access_own_or_admin(&admin, "u1"), Decision::Allow);
        assert_eq!(can_access_own_or_admin(&admin, "anything"), Decision::Allow);
    }

    #[test]
    fn test_admin_only() {
        assert!(can_access_admin_only(&claims("a", Role::Admin)).is_allowed());
        assert!(!can_access_admin_only(&claims("s", Role::Sales)).is_allowed());
        assert!(!can_access_admin_only(&claims("u", Role::User)).is_allowed());
    }

    #[test]
    fn test_role_set() {
        let sales = claims("s", Role::Sales);
        assert!(can_access_role_set(&sales, &Role::STAFF).is_allowed());
        assert!(!can_access_role_set(&sales, &[Role::Admin]).is_allowed());
        assert!(!can_access_role_set(&sales, &[]).is_allowed());
    }

    #[test]
    fn test_require_maps_deny_to_forbidden() {
        assert_eq!(Decision::Allow.require(), Ok(()));
        assert_eq!(Decision::Deny.require(), Err(Error::Forbidden));
    }
}
