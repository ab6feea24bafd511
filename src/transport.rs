use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{ClientError, Result};

/// HttpRequest
///
/// A transport-neutral description of one outbound call. The Authenticated Client
/// fills in `bearer`; public reads leave it empty.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path relative to the API base, always starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
    /// Correlates client logs with server logs via the `x-request-id` header.
    pub request_id: Uuid,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Same request under a new request id, for re-issuing a fetch.
    pub fn renewed(&self) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            ..self.clone()
        }
    }

    /// Looks up a query parameter by name.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// HttpResponse
///
/// Status plus the decoded JSON payload. Empty bodies decode to `Value::Null`,
/// non-JSON bodies are kept verbatim as a `Value::String`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Conventional authorization-failure statuses.
    pub fn is_auth_failure(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.body).map_err(ClientError::from)
    }
}

// 1. Transport Contract
/// Transport
///
/// The plain network seam. Knows nothing about sessions: it sends exactly what it
/// is given. Swapped for `MockTransport` in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// TransportState
///
/// The shared handle every component holds onto the transport.
pub type TransportState = Arc<dyn Transport>;

// 2. The Real Implementation
/// HttpTransport
///
/// `reqwest`-backed transport rooted at the API base URL. Timeouts are enforced by
/// the underlying client and surface as `ClientError::Transport` like any other
/// network failure.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::from)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let span = tracing::info_span!(
            "http_request",
            method = %request.method,
            path = %request.path,
            req_id = %request.request_id,
        );

        async move {
            let mut builder = self
                .http
                .request(request.method.clone(), self.url(&request.path))
                .header("x-request-id", request.request_id.to_string());

            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(token) = &request.bearer {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await?;

            let body = if text.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };

            tracing::debug!(status, "response received");
            Ok(HttpResponse { status, body })
        }
        .instrument(span)
        .await
    }
}

// 3. The Mock Implementation (For Tests)
type Responder = dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync;

/// MockTransport
///
/// In-process transport for tests. Every request is recorded before the scripted
/// responder runs, so tests can assert on call counts and attached headers
/// without a network. An optional delay keeps requests in flight long enough to
/// observe coalescing.
pub struct MockTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// A transport whose every call fails as if the network were down.
    pub fn unreachable() -> Self {
        Self::new(|_| Err(ClientError::Transport("connection refused".to_string())))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Snapshot of every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .map(|r| r.iter().filter(|req| req.path == path).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(&request)
    }
}
