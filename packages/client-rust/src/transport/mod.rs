//! Transport capability: execute one raw request against the backend.
//!
//! The orchestrator never knows which backend it talks to. The real
//! [`HttpTransport`] and the development [`SimulatedTransport`] are both just
//! implementations of [`Transport`], chosen once at construction time.

pub mod http;
pub mod simulated;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

pub use self::http::HttpTransport;
pub use self::simulated::SimulatedTransport;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// One logical backend request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Correlation id sent as `x-request-id` and recorded in tracing spans.
    pub request_id: String,
    pub method: ::http::Method,
    /// Path relative to the configured base URL, e.g. `/inventory`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Per-request attempt timeout. `None` uses the executor's policy.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    fn new(method: ::http::Method, path: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(::http::Method::GET, path)
    }

    /// POST with a JSON body. Serialization of plain data cannot fail; a
    /// value that does is sent as `null`.
    #[must_use]
    pub fn post(path: impl Into<String>, body: &impl Serialize) -> Self {
        let mut request = Self::new(::http::Method::POST, path);
        request.body = Some(serde_json::to_value(body).unwrap_or_default());
        request
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Status and undecoded body as received from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// JSON response helper, mostly for tests and the simulated backend.
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to obtain any HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("attempt timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Timeouts and connection-level failures may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connect(_))
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Executes a single raw request. No retries, no timeouts; the executor owns both.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn post_serializes_body() {
        let req = ApiRequest::post("/createPallet", &json!({"codigo": "1"}));
        assert_eq!(req.method, ::http::Method::POST);
        assert_eq!(req.body, Some(json!({"codigo": "1"})));
        assert!(!req.request_id.is_empty());
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(ApiRequest::get("/a").request_id, ApiRequest::get("/a").request_id);
    }

    #[test]
    fn transient_classification() {
        assert!(TransportError::Timeout { timeout_ms: 1 }.is_transient());
        assert!(TransportError::Connect("refused".into()).is_transient());
        assert!(!TransportError::Request("bad header".into()).is_transient());
    }
}
