//! Environment-driven configuration. The single place env vars are read, so
//! the startup banner can log exactly what the process will run with.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Startup-time seeded accounts held in memory.
    Memory,
    /// File-backed user store under `db_root`.
    File,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub db_root: String,
    pub provider: ProviderKind,
    pub session_ttl: Duration,
    /// Where a successful login points the client, if anywhere.
    pub success_redirect: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 7878,
            db_root: "dbs".to_string(),
            provider: ProviderKind::Memory,
            session_ttl: Duration::from_secs(60 * 60),
            success_redirect: Some("/sec".to_string()),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let http_port = std::env::var("CLUBGATE_HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.http_port);
        let db_root = std::env::var("CLUBGATE_DB_FOLDER").unwrap_or(defaults.db_root);
        let provider = match std::env::var("CLUBGATE_PROVIDER").ok().as_deref() {
            Some("file") => ProviderKind::File,
            _ => ProviderKind::Memory,
        };
        let session_ttl = std::env::var("CLUBGATE_SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_ttl);
        let success_redirect = match std::env::var("CLUBGATE_LOGIN_REDIRECT") {
            Ok(s) if s.is_empty() => None,
            Ok(s) => Some(s),
            Err(_) => defaults.success_redirect,
        };
        Self { http_port, db_root, provider, session_ttl, success_redirect }
    }
}
