use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::{
    error::{ClientError, Result},
    session::SessionManager,
    transport::{HttpRequest, HttpResponse, TransportState},
};

/// AuthenticatedClient
///
/// Wrapper for every call to a protected endpoint.
///
/// 1. No session: rejected with `Unauthenticated` before touching the network.
/// 2. Credential attached as `Authorization: Bearer <token>`.
/// 3. 401/403: never retried. The session is expired (one logout per
///    credential) and the caller gets `AuthorizationExpired`.
/// 4. Any other non-2xx: `Resource { status, payload }`, uninterpreted.
#[derive(Clone)]
pub struct AuthenticatedClient {
    session: Arc<SessionManager>,
    transport: TransportState,
}

impl AuthenticatedClient {
    pub fn new(session: Arc<SessionManager>, transport: TransportState) -> Self {
        Self { session, transport }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// request
    ///
    /// The `(method, path, body?)` entry point.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(method, path);
        request.body = body;
        self.send(request).await
    }

    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let credential = self
            .session
            .credential()
            .ok_or(ClientError::Unauthenticated)?;

        let response = self
            .transport
            .send(request.with_bearer(credential.clone()))
            .await?;

        if response.is_auth_failure() {
            let logged_out = self.session.expire(&credential).await;
            warn!(
                status = response.status,
                logged_out, "credential rejected, session terminated"
            );
            return Err(ClientError::AuthorizationExpired {
                status: response.status,
            });
        }

        expect_success(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Sends `body` as JSON with the given method and decodes the reply.
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = HttpRequest::new(method, path).with_body(serde_json::to_value(body)?);
        self.send(request).await?.json()
    }
}

/// Maps a non-2xx response to `ClientError::Resource`, carrying its payload.
pub fn expect_success(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Resource {
            status: response.status,
            payload: response.body,
        })
    }
}

/// Read-through for public resources: plain transport, no credential, no
/// session side effects even on 401/403.
pub async fn public_json<T: DeserializeOwned>(
    transport: &TransportState,
    request: HttpRequest,
) -> Result<T> {
    expect_success(transport.send(request).await?)?.json()
}
