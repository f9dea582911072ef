//! Login/logout orchestration and the per-request authorization gate.
//! All identity-layer failures are translated here into the three
//! user-visible outcomes; nothing below this module leaks past it.

use std::sync::Arc;

use tracing::info;

use super::principal::{authorities_for, AuthSubject, Origin, Principal};
use super::provider::{IdentityProvider, ResolveError};
use super::session::{Session, SessionManager};
use crate::access::{Decision, RuleTable};
use crate::credential;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
    /// Upstream-asserted login: resolve against federated records and skip
    /// the local password check.
    pub federated: bool,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
    pub redirect: Option<String>,
}

/// Entry point the request-handling layer calls: owns the provider, the
/// session transport and the access rule table.
pub struct AuthFlow {
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionManager,
    rules: Arc<RuleTable>,
    success_redirect: Option<String>,
}

impl AuthFlow {
    pub fn new(provider: Arc<dyn IdentityProvider>, sessions: SessionManager, rules: Arc<RuleTable>) -> Self {
        Self { provider, sessions, rules, success_redirect: None }
    }

    pub fn with_success_redirect<S: Into<String>>(mut self, target: S) -> Self {
        self.success_redirect = Some(target.into());
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Verify credentials and bind an authenticated principal to a fresh
    /// session. Unknown identifier and wrong password produce the same
    /// generic outcome; there is no observable half-authenticated state.
    pub fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AppError> {
        let identity = match self.provider.resolve(&req.identifier, req.federated) {
            Ok(identity) => identity,
            Err(ResolveError::NotFound) => return Err(AppError::invalid_credentials()),
        };
        // Federated identities were verified upstream; local ones must
        // present the password.
        if identity.origin == Origin::Local
            && !credential::verify_password(&identity.credential_hash, &req.password)
        {
            return Err(AppError::invalid_credentials());
        }
        let principal = Principal {
            subject_id: identity.identifier.clone(),
            authorities: authorities_for(&identity.roles),
            origin: identity.origin,
        };
        let session = self.sessions.issue(principal)?;
        info!(user = %req.identifier, sid = %session.session_id, "auth.login");
        Ok(LoginResponse { session, redirect: self.success_redirect.clone() })
    }

    /// Clear the session bound to the token, if any. Idempotent.
    pub fn logout(&self, token: Option<&str>) {
        if let Some(t) = token {
            if self.sessions.logout(t) {
                info!("auth.logout");
            }
        }
    }

    /// Gate a request path against the rule table using whatever principal
    /// the token resolves to. Ok carries the principal (None on a permit-all
    /// path); Err is `require_auth` or `access_denied`.
    pub fn authorize(&self, path: &str, token: Option<&str>) -> Result<Option<Principal>, AppError> {
        let principal = token.and_then(|t| self.sessions.current(t));
        let decision = self
            .rules
            .evaluate(path, principal.as_ref().map(|p| p as &dyn AuthSubject));
        match decision {
            Decision::Permit => Ok(principal),
            Decision::RequireAuth => Err(AppError::require_auth()),
            Decision::Deny => Err(AppError::access_denied()),
        }
    }
}
