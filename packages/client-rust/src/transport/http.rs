//! `reqwest`-backed transport for the real backend.

use async_trait::async_trait;

use super::{ApiRequest, RawResponse, Transport, TransportError};

/// Sends requests to `base_url` joined with the request path.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if the base URL does not parse or the
    /// HTTP client cannot be built (e.g. TLS backend initialization failure).
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        reqwest::Url::parse(base_url)
            .map_err(|e| TransportError::Request(format!("invalid base url {base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("bodega-terminal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Map a `reqwest` error onto the transport taxonomy.
fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { timeout_ms: 0 }
    } else if err.is_connect() || err.is_body() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .header("x-request-id", &request.request_id);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| classify(&e))?;
        Ok(RawResponse { status, body })
    }
}
