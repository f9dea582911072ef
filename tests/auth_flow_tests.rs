//! Auth integration tests: login lifecycle against the file-backed provider
//! and the access gate. These exercise positive and negative paths end to end.

use std::sync::Arc;

use anyhow::Result;
use tempfile::tempdir;

use clubgate::access::RuleTable;
use clubgate::identity::{
    add_user, ensure_seed_accounts, AuthFlow, LoginRequest, PersistedProvider, Role,
    SessionManager,
};

fn login_req(identifier: &str, password: &str) -> LoginRequest {
    LoginRequest { identifier: identifier.into(), password: password.into(), federated: false }
}

fn flow_for(root: &str) -> Result<AuthFlow> {
    let provider = PersistedProvider::open(root)?;
    Ok(AuthFlow::new(
        Arc::new(provider),
        SessionManager::default(),
        Arc::new(RuleTable::sec_defaults()),
    ))
}

#[test]
fn seeded_store_authenticates_both_stock_accounts() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    ensure_seed_accounts(root)?;
    let flow = flow_for(root)?;

    let user = flow.login(&login_req("user1", "1111")).expect("user1 login");
    assert_eq!(
        user.session.principal.authorities,
        ["ROLE_USER".to_string()].into_iter().collect()
    );

    let admin = flow.login(&login_req("admin", "1111")).expect("admin login");
    assert_eq!(
        admin.session.principal.authorities,
        ["ROLE_ADMIN".to_string()].into_iter().collect()
    );
    Ok(())
}

#[test]
fn ghost_user_and_bad_password_fail_identically() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    ensure_seed_accounts(root)?;
    let flow = flow_for(root)?;

    let ghost = flow.login(&login_req("ghost", "1111")).unwrap_err();
    let wrong = flow.login(&login_req("user1", "wrong")).unwrap_err();
    assert_eq!(ghost.code_str(), "invalid_credentials");
    assert_eq!(ghost.message(), wrong.message());
    Ok(())
}

#[test]
fn full_access_matrix_through_live_sessions() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    ensure_seed_accounts(root)?;
    let flow = flow_for(root)?;

    // Anonymous
    assert!(flow.authorize("/sec/all", None).is_ok());
    assert_eq!(flow.authorize("/sec/member", None).unwrap_err().code_str(), "require_auth");

    // USER session
    let user = flow.login(&login_req("user1", "1111"))?;
    let token = user.session.token.as_str();
    assert!(flow.authorize("/sec/all", Some(token)).is_ok());
    assert!(flow.authorize("/sec/member", Some(token)).is_ok());
    assert_eq!(flow.authorize("/sec/admin", Some(token)).unwrap_err().code_str(), "access_denied");

    // ADMIN session
    let admin = flow.login(&login_req("admin", "1111"))?;
    assert!(flow.authorize("/sec/admin", Some(&admin.session.token)).is_ok());
    assert!(flow.authorize("/sec/member", Some(&admin.session.token)).is_ok());

    // After logout the old token is anonymous again.
    flow.logout(Some(token));
    assert_eq!(flow.authorize("/sec/member", Some(token)).unwrap_err().code_str(), "require_auth");
    Ok(())
}

#[test]
fn persisted_roles_reach_the_gate() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    // Hand-built store: one admin, one roleless member relying on the
    // default USER grant.
    add_user(root, "boss", "s3cret", &[Role::Admin])?;
    add_user(root, "plain", "s3cret", &[])?;
    let flow = flow_for(root)?;

    let boss = flow.login(&login_req("boss", "s3cret"))?;
    assert!(flow.authorize("/sec/admin", Some(&boss.session.token)).is_ok());

    let plain = flow.login(&login_req("plain", "s3cret"))?;
    assert!(flow.authorize("/sec/member", Some(&plain.session.token)).is_ok());
    assert_eq!(
        flow.authorize("/sec/admin", Some(&plain.session.token)).unwrap_err().code_str(),
        "access_denied"
    );
    Ok(())
}

#[test]
fn unmatched_paths_require_authentication_but_no_role() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    ensure_seed_accounts(root)?;
    let flow = flow_for(root)?;

    assert_eq!(flow.authorize("/sec/other", None).unwrap_err().code_str(), "require_auth");
    let user = flow.login(&login_req("user1", "1111"))?;
    assert!(flow.authorize("/sec/other", Some(&user.session.token)).is_ok());
    Ok(())
}

#[test]
fn concurrent_logins_are_independent() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    ensure_seed_accounts(root)?;
    let flow = Arc::new(flow_for(root)?);

    let mut handles = Vec::new();
    for i in 0..8 {
        let flow = flow.clone();
        handles.push(std::thread::spawn(move || {
            let (who, pw) = if i % 2 == 0 { ("user1", "1111") } else { ("admin", "1111") };
            let resp = flow.login(&login_req(who, pw)).expect("login");
            assert_eq!(resp.session.principal.subject_id, who);
            resp.session.token
        }));
    }
    let tokens: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    // Every worker got its own live session.
    for t in &tokens {
        assert!(flow.sessions().current(t).is_some());
    }
    Ok(())
}

#[tokio::test]
async fn server_state_builds_over_a_file_store() -> Result<()> {
    let tmp = tempdir()?;
    let cfg = clubgate::config::Config {
        db_root: tmp.path().to_str().unwrap().to_string(),
        provider: clubgate::config::ProviderKind::File,
        ..Default::default()
    };
    let state = clubgate::server::build_state(&cfg)?;
    // Seeding ran: the stock admin can log in and reach the admin page.
    let resp = state.flow.login(&login_req("admin", "1111"))?;
    assert!(state.flow.authorize("/sec/admin", Some(&resp.session.token)).is_ok());
    // The router wires up against this state without panicking.
    let _app = clubgate::server::router(state);
    Ok(())
}
