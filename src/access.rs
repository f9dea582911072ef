//! Ordered, immutable path access rules evaluated first-match-wins.
//! The table is built once at startup as plain data; there is no hidden
//! default ordering, so more specific patterns must be registered first.

use regex::Regex;

use crate::identity::{AuthSubject, Role};

/// What a matched rule demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    PermitAll,
    RequireRole(Role),
    RequireAnyRole(Vec<Role>),
    DenyAll,
}

/// Outcome of gating one request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Permit,
    Deny,
    /// No principal bound; the caller should redirect to login rather than
    /// treat this as a hard denial.
    RequireAuth,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: String,
    regex: Regex,
    requirement: Requirement,
}

fn pattern_to_regex(pattern: &str) -> Regex {
    // Escape regex meta, then restore wildcards: ** -> .*, * -> [^/]*
    let mut s = regex::escape(pattern);
    s = s.replace("\\*\\*", ".*");
    s = s.replace("\\*", "[^/]*");
    let full = format!("^{}$", s);
    Regex::new(&full).unwrap_or_else(|_| Regex::new("^$").unwrap())
}

#[derive(Debug, Default)]
pub struct RuleTableBuilder {
    rules: Vec<CompiledRule>,
}

impl RuleTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, pattern: &str, requirement: Requirement) -> Self {
        self.rules.push(CompiledRule {
            pattern: pattern.to_string(),
            regex: pattern_to_regex(pattern),
            requirement,
        });
        self
    }

    pub fn permit_all(self, pattern: &str) -> Self {
        self.push(pattern, Requirement::PermitAll)
    }

    pub fn require_role(self, pattern: &str, role: Role) -> Self {
        self.push(pattern, Requirement::RequireRole(role))
    }

    pub fn require_any_role(self, pattern: &str, roles: &[Role]) -> Self {
        self.push(pattern, Requirement::RequireAnyRole(roles.to_vec()))
    }

    pub fn deny_all(self, pattern: &str) -> Self {
        self.push(pattern, Requirement::DenyAll)
    }

    pub fn build(self) -> RuleTable {
        RuleTable { rules: self.rules }
    }
}

/// The rule table. Built before serving begins and read-only afterwards, so
/// parallel workers evaluate it without locking.
#[derive(Debug)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    pub fn builder() -> RuleTableBuilder {
        RuleTableBuilder::new()
    }

    /// The boundary configured for this system: /sec/all is public,
    /// /sec/member takes USER or ADMIN, /sec/admin takes ADMIN only.
    pub fn sec_defaults() -> Self {
        Self::builder()
            .permit_all("/sec/all")
            .require_any_role("/sec/member", &[Role::User, Role::Admin])
            .require_role("/sec/admin", Role::Admin)
            .build()
    }

    /// Walk the table in registration order; the first pattern that matches
    /// decides. Unmatched paths are never implicitly public: with no
    /// principal the default is RequireAuth, with one it is Permit
    /// (authentication required, no specific role).
    pub fn evaluate(&self, path: &str, subject: Option<&dyn AuthSubject>) -> Decision {
        for rule in &self.rules {
            if !rule.regex.is_match(path) {
                continue;
            }
            return match &rule.requirement {
                Requirement::PermitAll => Decision::Permit,
                Requirement::DenyAll => Decision::Deny,
                Requirement::RequireRole(role) => match subject {
                    Some(s) if s.has_role(*role) => Decision::Permit,
                    Some(_) => Decision::Deny,
                    None => Decision::RequireAuth,
                },
                Requirement::RequireAnyRole(roles) => match subject {
                    Some(s) if roles.iter().any(|r| s.has_role(*r)) => Decision::Permit,
                    Some(_) => Decision::Deny,
                    None => Decision::RequireAuth,
                },
            };
        }
        match subject {
            Some(_) => Decision::Permit,
            None => Decision::RequireAuth,
        }
    }

    /// Registered patterns in evaluation order, for startup logging.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.pattern.as_str())
    }
}
