//! Identity resolution: a seeded in-memory store or a file-backed user store.
//! The variant is chosen once at startup via configuration and never mixed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::principal::{Origin, Role};
use crate::credential;

/// A resolvable account record. Read-only to the authentication core; the
/// only post-lookup mutation is the default USER grant in [`resolve`], which
/// never touches the stored record.
///
/// [`resolve`]: IdentityProvider::resolve
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Unique, case-sensitive login key.
    pub identifier: String,
    pub credential_hash: String,
    pub display_name: String,
    pub origin: Origin,
    #[serde(default)]
    pub roles: BTreeSet<Role>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("identity not found")]
    NotFound,
}

pub trait IdentityProvider: Send + Sync {
    /// Resolve a login identifier to an identity record. `federated_hint`
    /// selects between locally-managed and externally-asserted records, the
    /// single read this core performs against persistence.
    fn resolve(&self, identifier: &str, federated_hint: bool) -> Result<Identity, ResolveError>;
}

/// Every resolvable identity is at least a USER. Applied after a successful
/// fetch; deterministic and side-effect-free on the underlying record.
fn with_baseline_role(mut identity: Identity) -> Identity {
    if identity.roles.is_empty() {
        identity.roles.insert(Role::User);
    }
    identity
}

fn record_matches(record: &Identity, identifier: &str, federated_hint: bool) -> bool {
    record.identifier == identifier && (record.origin == Origin::Federated) == federated_hint
}

// ---------------------------------------------------------------------------
// In-memory provider (startup-time seeded accounts)
// ---------------------------------------------------------------------------

pub struct InMemoryProvider {
    users: Vec<Identity>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self { users: Vec::new() }
    }

    /// Add a local account, hashing the given plaintext. Replaces any earlier
    /// record with the same identifier.
    pub fn add_local_user(&mut self, identifier: &str, password: &str, roles: &[Role]) -> Result<()> {
        self.users.retain(|u| u.identifier != identifier);
        self.users.push(Identity {
            identifier: identifier.to_string(),
            credential_hash: credential::hash_password(password)?,
            display_name: identifier.to_string(),
            origin: Origin::Local,
            roles: roles.iter().copied().collect(),
        });
        Ok(())
    }

    /// Add a federated account. No credential is stored; the upstream party
    /// already verified it.
    pub fn add_federated_user(&mut self, identifier: &str, display_name: &str, roles: &[Role]) {
        self.users.retain(|u| u.identifier != identifier);
        self.users.push(Identity {
            identifier: identifier.to_string(),
            credential_hash: String::new(),
            display_name: display_name.to_string(),
            origin: Origin::Federated,
            roles: roles.iter().copied().collect(),
        });
    }

    /// The stock test accounts: `user1` with role USER and `admin` with role
    /// ADMIN, both with password `1111`.
    pub fn seeded() -> Result<Self> {
        let mut provider = Self::new();
        provider.add_local_user("user1", "1111", &[Role::User])?;
        provider.add_local_user("admin", "1111", &[Role::Admin])?;
        Ok(provider)
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for InMemoryProvider {
    fn resolve(&self, identifier: &str, federated_hint: bool) -> Result<Identity, ResolveError> {
        self.users
            .iter()
            .find(|u| record_matches(u, identifier, federated_hint))
            .cloned()
            .map(with_baseline_role)
            .ok_or(ResolveError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// File-backed provider (the persistence collaborator)
// ---------------------------------------------------------------------------

fn users_path(db_root: &str) -> PathBuf {
    Path::new(db_root).join("users.json")
}

fn read_users(path: &Path) -> Result<Vec<Identity>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("open user store {}", path.display()))?;
    let users: Vec<Identity> = serde_json::from_reader(file)
        .with_context(|| format!("parse user store {}", path.display()))?;
    Ok(users)
}

fn write_users(path: &Path, users: &[Identity]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("create user store {}", path.display()))?;
    serde_json::to_writer_pretty(file, users)?;
    Ok(())
}

/// Append or replace a record in the on-disk user store. Startup-time
/// administration only; the resolving core never writes.
pub fn add_user(db_root: &str, identifier: &str, password: &str, roles: &[Role]) -> Result<()> {
    let p = users_path(db_root);
    let mut users = read_users(&p)?;
    users.retain(|u| u.identifier != identifier);
    users.push(Identity {
        identifier: identifier.to_string(),
        credential_hash: credential::hash_password(password)?,
        display_name: identifier.to_string(),
        origin: Origin::Local,
        roles: roles.iter().copied().collect(),
    });
    write_users(&p, &users)
}

/// First-run seeding: create the user store with the stock accounts when no
/// store exists yet. A present store is left untouched.
pub fn ensure_seed_accounts(db_root: &str) -> Result<()> {
    let p = users_path(db_root);
    if p.exists() {
        return Ok(());
    }
    info!(db_root = %db_root, "seeding user store with default accounts");
    add_user(db_root, "user1", "1111", &[Role::User])?;
    add_user(db_root, "admin", "1111", &[Role::Admin])?;
    Ok(())
}

/// File-backed identity store. Records are loaded once at construction, so a
/// faulty store fails at startup and `resolve` itself can only miss.
pub struct PersistedProvider {
    users: Vec<Identity>,
}

impl PersistedProvider {
    pub fn open(db_root: &str) -> Result<Self> {
        let users = read_users(&users_path(db_root))?;
        info!(db_root = %db_root, count = users.len(), "loaded user store");
        Ok(Self { users })
    }
}

impl IdentityProvider for PersistedProvider {
    fn resolve(&self, identifier: &str, federated_hint: bool) -> Result<Identity, ResolveError> {
        self.users
            .iter()
            .find(|u| record_matches(u, identifier, federated_hint))
            .cloned()
            .map(with_baseline_role)
            .ok_or(ResolveError::NotFound)
    }
}
