use chrono::Utc;
use jsonwebtoken::dangerous::insecure_decode;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};

use crate::{
    cache::ResourceCache,
    error::{ClientError, Result},
    models::TokenResponse,
    token_store::TokenStoreState,
    transport::{HttpRequest, TransportState},
};

/// Identity
///
/// Who the session belongs to. The email doubles as the scope of every
/// user-scoped cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub display_name: Option<String>,
}

/// Session
///
/// Credential and identity always travel together; a half-built session cannot
/// be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credential: String,
    pub identity: Identity,
}

/// SessionState
///
/// Snapshot handed to readers. `Restoring` only exists between construction and
/// the end of `restore()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Restoring,
    Anonymous,
    Active(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Active(session) => Some(session),
            _ => None,
        }
    }
}

/// IdentityProof
///
/// What the external identity provider hands back after a password or
/// federated sign-in. Only the claims are forwarded to the issuance endpoint.
#[derive(Debug, Clone)]
pub enum IdentityProof {
    Password {
        email: String,
        display_name: Option<String>,
    },
    Federated {
        provider: String,
        email: String,
        display_name: Option<String>,
    },
}

impl IdentityProof {
    pub fn identity(&self) -> Identity {
        match self {
            IdentityProof::Password {
                email,
                display_name,
            }
            | IdentityProof::Federated {
                email,
                display_name,
                ..
            } => Identity {
                email: email.clone(),
                display_name: display_name.clone(),
            },
        }
    }
}

/// Claims
///
/// The payload the issuance endpoint signs: the identity claims it was sent,
/// plus the standard expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    UserRequested,
    AuthorizationExpired,
    MalformedToken,
}

/// SessionEvent
///
/// Broadcast on every session transition. `SignedOut` is the navigation signal:
/// the UI shell sends the user to `redirect_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn {
        email: String,
    },
    SignedOut {
        email: Option<String>,
        reason: SignOutReason,
        redirect_to: String,
    },
}

/// Reads identity claims out of a credential without verifying its signature.
/// The client holds no key and accepts any signing algorithm; the remote API
/// verifies every request.
pub fn decode_claims(token: &str) -> Result<Claims> {
    let claims = insecure_decode::<Claims>(token)
        .map_err(|e| ClientError::Decode(format!("malformed token: {e}")))?
        .claims;

    if claims.email.is_empty() {
        return Err(ClientError::Decode("token carries no identity".to_string()));
    }
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
    if claims.exp <= now {
        return Err(ClientError::Decode("token expired".to_string()));
    }
    Ok(claims)
}

/// SessionManager
///
/// Sole writer of the process-wide session. Everyone else reads snapshots.
/// Transitions (sign-in commit, sign-out, restore) are serialized so a sign-out
/// racing a sign-in can never delete the fresh credential from storage.
pub struct SessionManager {
    state: RwLock<SessionState>,
    transition: Mutex<()>,
    store: TokenStoreState,
    transport: TransportState,
    cache: ResourceCache,
    events: broadcast::Sender<SessionEvent>,
    login_route: String,
}

impl SessionManager {
    pub fn new(
        store: TokenStoreState,
        transport: TransportState,
        cache: ResourceCache,
        login_route: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: RwLock::new(SessionState::Restoring),
            transition: Mutex::new(()),
            store,
            transport,
            cache,
            events,
            login_route: login_route.into(),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.read_state().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.read_state().session().cloned()
    }

    pub fn credential(&self) -> Option<String> {
        self.read_state().session().map(|s| s.credential.clone())
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read_state().session().map(|s| s.identity.clone())
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// authenticate
    ///
    /// Exchanges an identity proof for a signed credential at `POST /jwt`,
    /// persists it, then publishes the new session. Any failure leaves the
    /// previous state untouched.
    pub async fn authenticate(&self, proof: IdentityProof) -> Result<Session> {
        let identity = proof.identity();
        let request = HttpRequest::new(Method::POST, "/jwt").with_body(serde_json::json!({
            "email": identity.email,
            "name": identity.display_name,
        }));

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ClientError::AuthExchange(e.to_string()))?;

        if !response.is_success() {
            warn!(status = response.status, email = %identity.email, "token issuance rejected");
            return Err(ClientError::AuthExchange(format!(
                "issuance endpoint answered HTTP {}",
                response.status
            )));
        }

        let TokenResponse { token } = response
            .json()
            .map_err(|e| ClientError::AuthExchange(e.to_string()))?;
        if token.is_empty() {
            return Err(ClientError::AuthExchange("empty token issued".to_string()));
        }

        let _guard = self.transition.lock().await;
        self.store.save(&token).await?;

        let session = Session {
            credential: token,
            identity,
        };
        let previous = std::mem::replace(
            &mut *self.write_state(),
            SessionState::Active(session.clone()),
        );

        // Switching accounts without an explicit logout must not leak the
        // previous user's cached data.
        if let SessionState::Active(old) = previous {
            if old.identity.email != session.identity.email {
                self.cache.evict_identity(&old.identity.email);
                self.cache.evict_protected();
            }
        }

        info!(email = %session.identity.email, "signed in");
        let _ = self.events.send(SessionEvent::SignedIn {
            email: session.identity.email.clone(),
        });
        Ok(session)
    }

    /// restore
    ///
    /// Startup rehydration from the token store. No call to the issuance
    /// endpoint: identity comes from the token's own claims. A token that cannot
    /// be decoded, or has expired, is treated as a logout.
    pub async fn restore(&self) -> Result<SessionState> {
        let _guard = self.transition.lock().await;

        let token = match self.store.read().await {
            Ok(token) => token,
            Err(e) => {
                *self.write_state() = SessionState::Anonymous;
                return Err(e);
            }
        };

        let Some(token) = token else {
            *self.write_state() = SessionState::Anonymous;
            return Ok(SessionState::Anonymous);
        };

        match decode_claims(&token) {
            Ok(claims) => {
                let session = Session {
                    credential: token,
                    identity: Identity {
                        email: claims.email,
                        display_name: claims.name,
                    },
                };
                *self.write_state() = SessionState::Active(session.clone());
                info!(email = %session.identity.email, "session restored");
                let _ = self.events.send(SessionEvent::SignedIn {
                    email: session.identity.email.clone(),
                });
                Ok(SessionState::Active(session))
            }
            Err(e) => {
                warn!(error = %e, "discarding stored credential");
                let previous = std::mem::replace(&mut *self.write_state(), SessionState::Anonymous);
                self.finish_sign_out(previous, SignOutReason::MalformedToken)
                    .await?;
                Ok(SessionState::Anonymous)
            }
        }
    }

    /// logout
    ///
    /// Clears memory, user-scoped cache entries and the token store, then emits
    /// the `SignedOut` navigation event, which is also returned. Safe to call
    /// with no session.
    pub async fn logout(&self) -> Result<SessionEvent> {
        let _guard = self.transition.lock().await;
        let previous = std::mem::replace(&mut *self.write_state(), SessionState::Anonymous);
        self.finish_sign_out(previous, SignOutReason::UserRequested)
            .await
    }

    /// expire
    ///
    /// Logout triggered by a rejected credential. Only acts if `credential` is
    /// still the live one, so several requests failing with the same expired
    /// token produce a single logout. Returns whether this call logged out.
    pub async fn expire(&self, credential: &str) -> bool {
        let _guard = self.transition.lock().await;
        let previous = {
            let mut state = self.write_state();
            match &*state {
                SessionState::Active(session) if session.credential == credential => {
                    std::mem::replace(&mut *state, SessionState::Anonymous)
                }
                _ => return false,
            }
        };

        if let Err(e) = self
            .finish_sign_out(previous, SignOutReason::AuthorizationExpired)
            .await
        {
            warn!(error = %e, "failed to clear stored credential after expiry");
        }
        true
    }

    async fn finish_sign_out(
        &self,
        previous: SessionState,
        reason: SignOutReason,
    ) -> Result<SessionEvent> {
        let email = previous.session().map(|s| s.identity.email.clone());
        if let Some(email) = &email {
            self.cache.evict_identity(email);
        }
        // Admin-wide listings carry no identity but were fetched with the
        // credential that just ended.
        self.cache.evict_protected();

        let event = SessionEvent::SignedOut {
            email: email.clone(),
            reason,
            redirect_to: self.login_route.clone(),
        };
        let _ = self.events.send(event.clone());

        match &email {
            Some(email) => info!(email = %email, ?reason, "signed out"),
            None => info!(?reason, "sign-out with no active session"),
        }

        self.store.clear().await?;
        Ok(event)
    }
}
