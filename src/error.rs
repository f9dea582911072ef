//! Unified application error model and HTTP mapping helpers.
//! Internal identity failures are folded into one of the user-visible outcomes
//! here; raw persistence or hashing errors never cross the HTTP boundary.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Generic login failure. Deliberately identical for "unknown user" and
    /// "wrong password" so the login endpoint leaks no enumeration signal.
    InvalidCredentials { code: String, message: String },
    /// No principal bound to the request; the caller should redirect to login.
    RequireAuth { code: String, message: String },
    /// Authenticated but lacking a required role.
    AccessDenied { code: String, message: String },
    UserInput { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::InvalidCredentials { code, .. }
            | AppError::RequireAuth { code, .. }
            | AppError::AccessDenied { code, .. }
            | AppError::UserInput { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::InvalidCredentials { message, .. }
            | AppError::RequireAuth { message, .. }
            | AppError::AccessDenied { message, .. }
            | AppError::UserInput { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn invalid_credentials() -> Self {
        AppError::InvalidCredentials {
            code: "invalid_credentials".into(),
            message: "invalid username or password".into(),
        }
    }
    pub fn require_auth() -> Self {
        AppError::RequireAuth { code: "require_auth".into(), message: "authentication required".into() }
    }
    pub fn access_denied() -> Self {
        AppError::AccessDenied { code: "access_denied".into(), message: "access denied".into() }
    }
    pub fn user<S: Into<String>>(code: S, msg: S) -> Self {
        AppError::UserInput { code: code.into(), message: msg.into() }
    }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self {
        AppError::Internal { code: code.into(), message: msg.into() }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::InvalidCredentials { .. } => 401,
            AppError::RequireAuth { .. } => 401,
            AppError::AccessDenied { .. } => 403,
            AppError::UserInput { .. } => 400,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    // Operational faults (e.g. a failed store read) are never downgraded to
    // invalid_credentials; they surface as internal errors.
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::invalid_credentials().http_status(), 401);
        assert_eq!(AppError::require_auth().http_status(), 401);
        assert_eq!(AppError::access_denied().http_status(), 403);
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::internal("internal", "boom").http_status(), 500);
    }

    #[test]
    fn login_failures_share_one_message() {
        // Unknown-user and wrong-password paths both come through this
        // constructor, so their wire form must be indistinguishable.
        let a = AppError::invalid_credentials();
        let b = AppError::invalid_credentials();
        assert_eq!(a.code_str(), b.code_str());
        assert_eq!(a.message(), b.message());
    }

    #[test]
    fn operational_faults_stay_internal() {
        let e: AppError = anyhow::anyhow!("user file unreadable").into();
        assert_eq!(e.http_status(), 500);
        assert_ne!(e.code_str(), "invalid_credentials");
    }
}
