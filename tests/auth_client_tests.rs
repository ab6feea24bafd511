mod common;

use bistro_client::{
    ClientError, MockTransport, SessionEvent, SessionState, TokenStore,
    session::SignOutReason,
    transport::HttpResponse,
};
use common::*;
use reqwest::Method;
use serde_json::json;
use std::{sync::Arc, time::Duration};

#[tokio::test]
async fn test_protected_call_without_session_never_reaches_network() {
    let (state, transport, _store) = anonymous_client(Arc::new(FakeApi::default())).await;

    let result = state.client.request(Method::GET, "/orders", None).await;

    assert!(matches!(result, Err(ClientError::Unauthenticated)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_bearer_credential_is_attached() {
    let (state, transport, _store) = anonymous_client(Arc::new(FakeApi::default())).await;
    let session = state
        .session
        .authenticate(proof("a@x.com", "Ann"))
        .await
        .unwrap();

    let response = state
        .client
        .request(Method::GET, "/orders", None)
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let sent = transport.requests().pop().unwrap();
    assert_eq!(sent.path, "/orders");
    assert_eq!(sent.bearer, Some(session.credential));
}

#[tokio::test]
async fn test_authorization_failure_logs_out_and_blocks_further_calls() {
    let api = Arc::new(FakeApi::default());
    let (state, transport, store) = anonymous_client(api.clone()).await;
    state
        .session
        .authenticate(proof("a@x.com", "Ann"))
        .await
        .unwrap();
    let mut events = state.session.subscribe();

    api.expire_credentials();
    let result = state.client.request(Method::GET, "/orders", None).await;

    assert!(matches!(
        result,
        Err(ClientError::AuthorizationExpired { status: 401 })
    ));
    assert_eq!(state.session.state(), SessionState::Anonymous);
    assert_eq!(store.read().await.unwrap(), None);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::SignedOut {
            email: Some("a@x.com".to_string()),
            reason: SignOutReason::AuthorizationExpired,
            redirect_to: "/login".to_string(),
        }
    );

    // No retry happened, and nothing further goes out until a new sign-in.
    let calls = transport.calls_to("/orders");
    assert_eq!(calls, 1);
    let again = state.client.request(Method::GET, "/orders", None).await;
    assert!(matches!(again, Err(ClientError::Unauthenticated)));
    assert_eq!(transport.calls_to("/orders"), calls);
}

#[tokio::test]
async fn test_forbidden_is_treated_as_authorization_failure() {
    let transport = Arc::new(MockTransport::new(|req| {
        if req.path == "/jwt" {
            Ok(HttpResponse::ok(
                json!({ "token": mint_token("a@x.com", None, 3600) }),
            ))
        } else {
            Ok(HttpResponse::new(403, json!({ "message": "forbidden access" })))
        }
    }));
    let store = bistro_client::MemoryTokenStore::new();
    let state = build_state(&transport, &store);
    state.session.restore().await.unwrap();
    state
        .session
        .authenticate(proof("a@x.com", "Ann"))
        .await
        .unwrap();

    let result = state.client.request(Method::GET, "/users", None).await;

    assert!(matches!(
        result,
        Err(ClientError::AuthorizationExpired { status: 403 })
    ));
    assert!(state.session.session().is_none());
}

#[tokio::test]
async fn test_concurrent_rejections_trigger_a_single_logout() {
    let api = Arc::new(FakeApi::default());
    let transport = slow_transport(api.clone(), Duration::from_millis(20));
    let store = bistro_client::MemoryTokenStore::new();
    let state = build_state(&transport, &store);
    state.session.restore().await.unwrap();
    state
        .session
        .authenticate(proof("a@x.com", "Ann"))
        .await
        .unwrap();
    let mut events = state.session.subscribe();
    api.expire_credentials();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let client = state.client.clone();
            tokio::spawn(async move { client.request(Method::GET, "/orders", None).await })
        })
        .collect();
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(ClientError::AuthorizationExpired { .. })
        ));
    }

    let mut sign_outs = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::SignedOut { .. }) {
            sign_outs += 1;
        }
    }
    assert_eq!(sign_outs, 1);
    assert_eq!(transport.calls_to("/orders"), 5);
}

#[tokio::test]
async fn test_other_failures_carry_status_and_payload() {
    let (state, _transport, _store) = anonymous_client(Arc::new(FakeApi::default())).await;
    state
        .session
        .authenticate(proof("a@x.com", "Ann"))
        .await
        .unwrap();

    let result = state.client.request(Method::GET, "/broken", None).await;

    match result {
        Err(ClientError::Resource { status, payload }) => {
            assert_eq!(status, 500);
            assert_eq!(payload["message"], "database unavailable");
        }
        other => panic!("expected resource error, got {other:?}"),
    }
    // Application errors leave the session alone.
    assert!(state.session.session().is_some());
}

#[tokio::test]
async fn test_transport_failure_is_surfaced_without_logout() {
    let transport = Arc::new(MockTransport::new(|req| {
        if req.path == "/jwt" {
            Ok(HttpResponse::ok(
                json!({ "token": mint_token("a@x.com", None, 3600) }),
            ))
        } else {
            Err(ClientError::Transport("operation timed out".to_string()))
        }
    }));
    let store = bistro_client::MemoryTokenStore::new();
    let state = build_state(&transport, &store);
    state.session.restore().await.unwrap();
    state
        .session
        .authenticate(proof("a@x.com", "Ann"))
        .await
        .unwrap();

    let result = state.client.request(Method::GET, "/orders", None).await;

    assert!(matches!(result, Err(ClientError::Transport(_))));
    assert!(state.session.session().is_some());
    assert_eq!(transport.calls_to("/orders"), 1);
}

#[tokio::test]
async fn test_stale_rejection_after_relogin_keeps_new_session() {
    let transport = mock_transport(Arc::new(FakeApi::default()));
    let store = bistro_client::MemoryTokenStore::with_token(&mint_token("a@x.com", Some("Ann"), 7200));
    let state = build_state(&transport, &store);
    let old = match state.session.restore().await.unwrap() {
        SessionState::Active(session) => session,
        other => panic!("expected restored session, got {other:?}"),
    };
    let fresh = state
        .session
        .authenticate(proof("a@x.com", "Ann"))
        .await
        .unwrap();
    assert_ne!(old.credential, fresh.credential);

    // A late 401 for the replaced credential must not end the new session.
    assert!(!state.session.expire(&old.credential).await);
    assert_eq!(state.session.session(), Some(fresh.clone()));

    assert!(state.session.expire(&fresh.credential).await);
    assert!(state.session.session().is_none());
}
