mod common;

use bistro_client::{
    AccessPolicy, Decision, MemoryTokenStore, MockTransport, Role, RoleLookup, SessionState,
    evaluate,
    routes::route_table,
    session::{Identity, Session},
    transport::HttpResponse,
};
use common::*;
use serde_json::json;
use std::sync::Arc;

fn active() -> SessionState {
    SessionState::Active(Session {
        credential: "token".to_string(),
        identity: Identity {
            email: "a@x.com".to_string(),
            display_name: None,
        },
    })
}

fn denied() -> Decision {
    Decision::Denied {
        redirect_to: "/login".to_string(),
    }
}

// --- Pure evaluation ---

#[test]
fn test_evaluate_public_is_always_allowed() {
    for state in [SessionState::Restoring, SessionState::Anonymous, active()] {
        assert_eq!(
            evaluate(&AccessPolicy::Public, &state, &RoleLookup::Loading, "/login"),
            Decision::Allowed
        );
    }
}

#[test]
fn test_evaluate_requires_session() {
    let policy = AccessPolicy::RequiresSession;
    let role = RoleLookup::Loading;

    assert_eq!(evaluate(&policy, &SessionState::Restoring, &role, "/login"), Decision::Pending);
    assert_eq!(evaluate(&policy, &SessionState::Anonymous, &role, "/login"), denied());
    assert_eq!(evaluate(&policy, &active(), &role, "/login"), Decision::Allowed);
}

#[test]
fn test_evaluate_requires_role() {
    let policy = AccessPolicy::RequiresRole(Role::Admin);
    let cases = [
        (SessionState::Restoring, RoleLookup::Resolved(true), Decision::Pending),
        (SessionState::Anonymous, RoleLookup::Resolved(true), denied()),
        (active(), RoleLookup::Loading, Decision::Pending),
        (active(), RoleLookup::Resolved(true), Decision::Allowed),
        (active(), RoleLookup::Resolved(false), denied()),
        (active(), RoleLookup::Failed, denied()),
    ];

    for (state, role, expected) in cases {
        assert_eq!(
            evaluate(&policy, &state, &role, "/login"),
            expected,
            "state {state:?}, role {role:?}"
        );
    }
}

#[test]
fn test_denial_redirects_to_configured_login_route() {
    let decision = evaluate(
        &AccessPolicy::RequiresSession,
        &SessionState::Anonymous,
        &RoleLookup::Loading,
        "/signin",
    );
    assert_eq!(
        decision,
        Decision::Denied {
            redirect_to: "/signin".to_string()
        }
    );
}

// --- Route table ---

#[test]
fn test_route_table_matches_patterns() {
    let routes = route_table();
    let admin = AccessPolicy::RequiresRole(Role::Admin);

    assert_eq!(routes.policy_for("/"), AccessPolicy::Public);
    assert_eq!(routes.policy_for("/order/salad"), AccessPolicy::Public);
    assert_eq!(routes.policy_for("/menu?category=soup"), AccessPolicy::Public);
    assert_eq!(routes.policy_for("/dashboard"), admin);
    assert_eq!(routes.policy_for("/dashboard/update-item/42"), admin);
    assert_eq!(routes.policy_for("/dashboard/cart"), AccessPolicy::RequiresSession);
    assert_eq!(routes.policy_for("/dashboard/cart#summary"), AccessPolicy::RequiresSession);
}

#[test]
fn test_unlisted_route_requires_session() {
    let routes = route_table();
    assert_eq!(routes.policy_for("/secret-page"), AccessPolicy::RequiresSession);
    assert_eq!(routes.policy_for("/order/salad/extra"), AccessPolicy::RequiresSession);
}

// --- Live guard ---

#[tokio::test]
async fn test_no_session_is_denied_from_dashboard() {
    let (state, transport, _store) = anonymous_client(Arc::new(FakeApi::default())).await;

    assert_eq!(state.guard.check("/dashboard").await, denied());
    assert_eq!(state.guard.check("/dashboard/cart").await, denied());
    assert_eq!(state.guard.check("/menu").await, Decision::Allowed);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_guard_is_pending_while_restoring() {
    let transport = mock_transport(Arc::new(FakeApi::default()));
    let store = MemoryTokenStore::with_token(&mint_token("a@x.com", None, 3600));
    let state = build_state(&transport, &store);

    assert_eq!(state.guard.check("/dashboard/cart").await, Decision::Pending);
    assert_eq!(state.guard.decide_now("/dashboard/users"), Decision::Pending);

    state.session.restore().await.unwrap();
    assert_eq!(state.guard.check("/dashboard/cart").await, Decision::Allowed);
}

#[tokio::test]
async fn test_non_admin_is_denied_admin_route() {
    let (state, transport, _store) = anonymous_client(Arc::new(FakeApi::default())).await;
    state
        .session
        .authenticate(proof("a@x.com", "Ann"))
        .await
        .unwrap();

    assert_eq!(state.guard.check("/dashboard/users").await, denied());
    assert_eq!(state.guard.check("/dashboard/cart").await, Decision::Allowed);
    assert_eq!(transport.calls_to("/users/a@x.com"), 1);
}

#[tokio::test]
async fn test_admin_is_allowed_and_lookup_is_cached() {
    let api = Arc::new(FakeApi::with_admins(&["boss@x.com"]));
    let (state, transport, _store) = anonymous_client(api).await;
    state
        .session
        .authenticate(proof("boss@x.com", "Boss"))
        .await
        .unwrap();

    // Nothing is known yet: the shell shows a placeholder, not a redirect.
    assert_eq!(state.guard.decide_now("/dashboard/users"), Decision::Pending);

    assert_eq!(state.guard.check("/dashboard/users").await, Decision::Allowed);
    assert_eq!(state.guard.check("/dashboard/manage-items").await, Decision::Allowed);
    assert_eq!(state.guard.decide_now("/dashboard/users"), Decision::Allowed);
    assert_eq!(transport.calls_to("/users/boss@x.com"), 1);
}

#[tokio::test]
async fn test_failed_role_lookup_denies() {
    let transport = Arc::new(MockTransport::new(|req| {
        if req.path == "/jwt" {
            Ok(HttpResponse::ok(
                json!({ "token": mint_token("a@x.com", None, 3600) }),
            ))
        } else {
            Ok(HttpResponse::new(500, json!({ "message": "lookup failed" })))
        }
    }));
    let store = MemoryTokenStore::new();
    let state = build_state(&transport, &store);
    state.session.restore().await.unwrap();
    state
        .session
        .authenticate(proof("a@x.com", "Ann"))
        .await
        .unwrap();

    assert_eq!(state.guard.check("/dashboard/admin-home").await, denied());
    assert_eq!(state.guard.decide_now("/dashboard/admin-home"), denied());
    // A failed lookup is not an authorization failure.
    assert!(state.session.session().is_some());
}

#[tokio::test]
async fn test_rejected_role_lookup_ends_session_and_denies() {
    let api = Arc::new(FakeApi::with_admins(&["boss@x.com"]));
    let (state, _transport, _store) = anonymous_client(api.clone()).await;
    state
        .session
        .authenticate(proof("boss@x.com", "Boss"))
        .await
        .unwrap();
    api.expire_credentials();

    assert_eq!(state.guard.check("/dashboard").await, denied());
    assert_eq!(state.session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_role_is_forgotten_after_logout() {
    let api = Arc::new(FakeApi::with_admins(&["boss@x.com"]));
    let (state, transport, _store) = anonymous_client(api).await;
    state
        .session
        .authenticate(proof("boss@x.com", "Boss"))
        .await
        .unwrap();
    assert_eq!(state.guard.check("/dashboard").await, Decision::Allowed);

    state.session.logout().await.unwrap();
    assert_eq!(state.guard.check("/dashboard").await, denied());

    state
        .session
        .authenticate(proof("boss@x.com", "Boss"))
        .await
        .unwrap();
    assert_eq!(state.guard.decide_now("/dashboard"), Decision::Pending);
    assert_eq!(state.guard.check("/dashboard").await, Decision::Allowed);
    assert_eq!(transport.calls_to("/users/boss@x.com"), 2);
}
