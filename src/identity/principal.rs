use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Fixed naming convention for authority tokens: `ROLE_` + canonical role name.
pub const AUTHORITY_PREFIX: &str = "ROLE_";

/// Closed, process-wide role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// The authorization-system string form of this role, e.g. `ROLE_ADMIN`.
    pub fn authority(&self) -> String {
        format!("{}{}", AUTHORITY_PREFIX, self.canonical_name())
    }
}

/// Where an identity's credential was verified. Federated identities were
/// asserted by an external party and never undergo local password checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Local,
    Federated,
}

/// Pure role-to-authority mapping. Set in, set out: duplicates collapse and
/// ordering is irrelevant, so `{USER, ADMIN}` and `{ADMIN, USER}` map equal.
pub fn authorities_for(roles: &BTreeSet<Role>) -> BTreeSet<String> {
    roles.iter().map(|r| r.authority()).collect()
}

/// Capability surface a request gate needs from an authenticated caller:
/// a stable identifier and the derived authority set. Kept as a trait so the
/// matcher does not depend on any concrete principal representation.
pub trait AuthSubject {
    fn subject_id(&self) -> &str;
    fn authorities(&self) -> &BTreeSet<String>;

    fn has_role(&self, role: Role) -> bool {
        self.authorities().contains(&role.authority())
    }
}

/// The authenticated representation of an identity, bound to a session on
/// successful login; absent for anonymous requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: String,
    #[serde(default)]
    pub authorities: BTreeSet<String>,
    pub origin: Origin,
}

impl AuthSubject for Principal {
    fn subject_id(&self) -> &str {
        &self.subject_id
    }
    fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_naming_convention() {
        assert_eq!(Role::User.authority(), "ROLE_USER");
        assert_eq!(Role::Admin.authority(), "ROLE_ADMIN");
    }

    #[test]
    fn mapping_is_order_independent() {
        let a: BTreeSet<Role> = [Role::Admin, Role::User].into_iter().collect();
        let b: BTreeSet<Role> = [Role::User, Role::Admin].into_iter().collect();
        assert_eq!(authorities_for(&a), authorities_for(&b));
        assert_eq!(
            authorities_for(&a),
            ["ROLE_ADMIN".to_string(), "ROLE_USER".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn duplicate_roles_collapse() {
        let roles: BTreeSet<Role> = [Role::User, Role::User, Role::Admin].into_iter().collect();
        assert_eq!(authorities_for(&roles).len(), 2);
    }

    #[test]
    fn principal_role_check_goes_through_authorities() {
        let p = Principal {
            subject_id: "user1".into(),
            authorities: authorities_for(&[Role::User].into_iter().collect()),
            origin: Origin::Local,
        };
        assert!(p.has_role(Role::User));
        assert!(!p.has_role(Role::Admin));
    }
}
