//!
//! clubgate HTTP server
//! --------------------
//! Axum-based HTTP surface over the authentication/authorization core.
//!
//! Responsibilities:
//! - Session cookie + CSRF token plumbing for the login/logout lifecycle.
//! - Login/logout endpoints backed by the `identity` flow.
//! - Gated /sec pages returning view names for the rendering collaborator.
//! - Startup wiring: provider selection, first-run account seeding, rule
//!   table construction and inventory logging.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::access::RuleTable;
use crate::config::{Config, ProviderKind};
use crate::error::AppError;
use crate::identity::{
    ensure_seed_accounts, AuthFlow, IdentityProvider, InMemoryProvider, LoginRequest,
    PersistedProvider, Principal, SessionManager,
};

const SESSION_COOKIE: &str = "clubgate_session";

/// Shared server state injected into all handlers.
///
/// The flow (provider + sessions + rule table) is immutable after startup;
/// only the CSRF map mutates per login/logout.
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<AuthFlow>,
    /// Session token -> CSRF token mapping
    pub csrf_tokens: Arc<RwLock<HashMap<String, String>>>,
}

/// Build the application state from configuration: pick the identity
/// provider variant, seed first-run accounts and freeze the rule table.
pub fn build_state(cfg: &Config) -> anyhow::Result<AppState> {
    let provider: Arc<dyn IdentityProvider> = match cfg.provider {
        ProviderKind::Memory => {
            info!("identity provider: in-memory seeded accounts");
            Arc::new(InMemoryProvider::seeded()?)
        }
        ProviderKind::File => {
            std::fs::create_dir_all(&cfg.db_root)?;
            ensure_seed_accounts(&cfg.db_root)?;
            info!(db_root = %cfg.db_root, "identity provider: file-backed user store");
            Arc::new(PersistedProvider::open(&cfg.db_root)?)
        }
    };

    let rules = Arc::new(RuleTable::sec_defaults());
    let patterns: Vec<&str> = rules.patterns().collect();
    info!(rules = ?patterns, "access rule table built (first-match-wins, unmatched => require_auth)");

    let mut flow = AuthFlow::new(provider, SessionManager::new(cfg.session_ttl), rules);
    if let Some(target) = &cfg.success_redirect {
        flow = flow.with_success_redirect(target.clone());
    }
    Ok(AppState { flow: Arc::new(flow), csrf_tokens: Arc::new(RwLock::new(HashMap::new())) })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "clubgate ok" }))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/csrf", get(get_csrf))
        .route("/sec", get(sec_index))
        .route("/sec/all", get(sec_all))
        .route("/sec/member", get(sec_member))
        .route("/sec/admin", get(sec_admin))
        .fallback(guarded_fallback)
        .with_state(state)
}

pub async fn run_with_config(cfg: Config) -> anyhow::Result<()> {
    let state = build_state(&cfg)?;
    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(Config::from_env()).await
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // Secure, HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE, token
    ))
    .unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE
    ))
    .unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn gen_csrf() -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let mut out = String::with_capacity(64);
    use std::fmt::Write as _;
    for b in &bytes {
        let _ = write!(&mut out, "{:02x}", b);
    }
    Ok(out)
}

async fn validate_csrf(state: &AppState, headers: &HeaderMap, token: &str) -> bool {
    let Some(provided) = headers
        .get("x-csrf-token")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
    else {
        return false;
    };
    let cmap = state.csrf_tokens.read().await;
    match cmap.get(token) {
        Some(expected) => expected == &provided,
        None => false,
    }
}

/// Translate a gate outcome into the wire response for a denied request.
fn outcome_response(err: AppError) -> (StatusCode, HeaderMap, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match &err {
        // Not a hard denial: point the caller at the login flow.
        AppError::RequireAuth { code, .. } => json!({"status": code, "login": "/login"}),
        _ => json!({"status": err.code_str(), "error": err.message()}),
    };
    (status, HeaderMap::new(), Json(body))
}

/// Gate one request path. Ok carries the bound principal (None on public
/// paths); Err is the ready-made denial response.
async fn gate(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
) -> Result<Option<Principal>, (StatusCode, HeaderMap, Json<serde_json::Value>)> {
    let token = session_token(headers);
    state
        .flow
        .authorize(path, token.as_deref())
        .map_err(outcome_response)
}

/// Render a protected page: gate the path, then hand the view name to the
/// rendering collaborator (here: straight onto the wire).
async fn render_gated(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    view: &str,
) -> (StatusCode, HeaderMap, Json<serde_json::Value>) {
    match gate(state, headers, path).await {
        Ok(Some(p)) => (
            StatusCode::OK,
            HeaderMap::new(),
            Json(json!({"status": "ok", "view": view, "user": p.subject_id})),
        ),
        Ok(None) => (StatusCode::OK, HeaderMap::new(), Json(json!({"status": "ok", "view": view}))),
        Err(resp) => resp,
    }
}

async fn sec_index(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    render_gated(&state, &headers, "/sec", "sec/index").await
}

async fn sec_all(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    render_gated(&state, &headers, "/sec/all", "sec/all").await
}

async fn sec_member(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    render_gated(&state, &headers, "/sec/member", "sec/member").await
}

async fn sec_admin(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    render_gated(&state, &headers, "/sec/admin", "sec/admin").await
}

/// Unrouted paths still pass the rule table first, so nothing under this
/// server is implicitly public.
async fn guarded_fallback(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: axum::extract::Request,
) -> impl IntoResponse {
    let path = req.uri().path().to_string();
    match gate(&state, &headers, &path).await {
        Ok(_) => (
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            Json(json!({"status": "not_found", "path": path})),
        ),
        Err(resp) => resp,
    }
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    // Federation is asserted by a trusted upstream collaborator, never by
    // the wire client: form logins always resolve local records and always
    // run the password check.
    let req = LoginRequest {
        identifier: payload.username,
        password: payload.password,
        federated: false,
    };
    match state.flow.login(&req) {
        Ok(resp) => {
            let csrf = match gen_csrf() {
                Ok(c) => c,
                Err(e) => {
                    error!("login error: {e}");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        HeaderMap::new(),
                        Json(json!({"status": "error", "error": "session setup failed"})),
                    );
                }
            };
            {
                let mut cmap = state.csrf_tokens.write().await;
                cmap.insert(resp.session.token.clone(), csrf);
            }
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&resp.session.token));
            let body = match resp.redirect {
                Some(target) => json!({"status": "ok", "redirect": target}),
                None => json!({"status": "ok"}),
            };
            (StatusCode::OK, headers, Json(body))
        }
        Err(e @ AppError::InvalidCredentials { .. }) => outcome_response(e),
        Err(e) => {
            error!("login error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                HeaderMap::new(),
                Json(json!({"status": "error", "error": e.message()})),
            )
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let token = session_token(&headers);
    // CSRF is only meaningful for a live session; an anonymous logout is a
    // no-op success.
    if let Some(t) = &token {
        if state.flow.sessions().current(t).is_some() && !validate_csrf(&state, &headers, t).await {
            return (
                StatusCode::FORBIDDEN,
                HeaderMap::new(),
                Json(json!({"status": "forbidden", "error": "invalid csrf"})),
            );
        }
        let mut cmap = state.csrf_tokens.write().await;
        cmap.remove(t);
    }
    state.flow.logout(token.as_deref());
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status": "ok"})))
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Must be logged in to fetch the CSRF token
    let Some(token) = session_token(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"status": "unauthorized"})));
    };
    if state.flow.sessions().current(&token).is_none() {
        return (StatusCode::UNAUTHORIZED, Json(json!({"status": "unauthorized"})));
    }
    let cmap = state.csrf_tokens.read().await;
    if let Some(csrf) = cmap.get(&token) {
        return (StatusCode::OK, Json(json!({"status": "ok", "csrf": csrf})));
    }
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": "error", "error": "csrf not available"})))
}
