use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use base64::Engine;
use parking_lot::RwLock;
use tracing::debug;

use super::principal::Principal;

pub type SessionToken = String;

/// A client binding to one authenticated principal. Expiry is enforced on
/// validation; expired entries are pruned lazily.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
struct SessionStore {
    sessions: HashMap<String, Session>,
    user_index: HashMap<String, HashSet<String>>,
    revoked: HashSet<String>,
}

// Revoked tokens are also removed from `sessions`, so the set is a tripwire
// only and can be cleared once it grows past this cap.
const REVOKED_CAP: usize = 4096;

fn gen_id() -> Result<String> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Session transport: bind on login, current per request, clear on logout.
/// Cloning shares the underlying store.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    store: Arc<RwLock<SessionStore>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(60 * 60))
    }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, store: Arc::new(RwLock::new(SessionStore::default())) }
    }

    /// Bind a principal to a fresh session. Fails only when the OS random
    /// source does, in which case no session is created.
    pub fn issue(&self, principal: Principal) -> Result<Session> {
        let now = Instant::now();
        let sid = gen_id()?;
        let token = gen_id()?;
        let session = Session {
            session_id: sid.clone(),
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        {
            let mut store = self.store.write();
            store.sessions.insert(token.clone(), session.clone());
            store
                .user_index
                .entry(principal.subject_id.clone())
                .or_default()
                .insert(token);
        }
        debug!(user = %principal.subject_id, sid = %sid, ttl_secs = self.ttl.as_secs(), "session.issue");
        Ok(session)
    }

    /// Principal currently bound to the token, if any. Expired or revoked
    /// tokens yield None; expired entries are dropped on the way out.
    pub fn current(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        let mut expired = false;
        let out = {
            let store = self.store.read();
            if store.revoked.contains(token) {
                return None;
            }
            match store.sessions.get(token) {
                Some(s) if s.expires_at > now => Some(s.principal.clone()),
                Some(_) => {
                    expired = true;
                    None
                }
                None => None,
            }
        };
        if expired {
            let mut store = self.store.write();
            if let Some(session) = store.sessions.remove(token) {
                Self::unindex(&mut store, &session.principal.subject_id, token);
            }
        }
        out
    }

    /// Drop a token from the per-user index, removing the entry once empty.
    fn unindex(store: &mut SessionStore, user_id: &str, token: &str) {
        let emptied = match store.user_index.get_mut(user_id) {
            Some(set) => {
                set.remove(token);
                set.is_empty()
            }
            None => false,
        };
        if emptied {
            store.user_index.remove(user_id);
        }
    }

    fn mark_revoked(store: &mut SessionStore, token: &str) {
        if store.revoked.len() >= REVOKED_CAP {
            store.revoked.clear();
        }
        store.revoked.insert(token.to_string());
    }

    /// Clear any principal bound to the token. Idempotent: logging out an
    /// anonymous or already-cleared session is a no-op success.
    pub fn logout(&self, token: &str) -> bool {
        let mut store = self.store.write();
        if let Some(session) = store.sessions.remove(token) {
            let uid = session.principal.subject_id;
            Self::unindex(&mut store, &uid, token);
            Self::mark_revoked(&mut store, token);
            true
        } else {
            false
        }
    }

    /// Drop every session bound to a user. Returns the number cleared.
    pub fn revoke_user(&self, user_id: &str) -> usize {
        let mut store = self.store.write();
        let tokens: Vec<String> = store
            .user_index
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let mut count = 0usize;
        for t in &tokens {
            if store.sessions.remove(t).is_some() {
                count += 1;
            }
            Self::mark_revoked(&mut store, t);
        }
        store.user_index.remove(user_id);
        debug!(user = %user_id, count = count, "session.revoke");
        count
    }
}
