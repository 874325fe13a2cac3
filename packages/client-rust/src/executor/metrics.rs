//! Attempt instrumentation.
//!
//! Records attempt duration and outcome using `tracing` spans, not a metrics
//! crate.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use super::Attempt;
use crate::transport::{RawResponse, TransportError};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps each attempt in an `attempt` span.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Attempt> for MetricsService<S>
where
    S: Service<Attempt, Response = RawResponse, Error = TransportError> + Send,
    S::Future: Send + 'static,
{
    type Response = RawResponse;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, attempt: Attempt) -> Self::Future {
        let span = info_span!(
            "attempt",
            request_id = %attempt.request.request_id,
            method = %attempt.request.method,
            path = %attempt.request.path,
            attempt = attempt.number,
            duration_ms = tracing::field::Empty,
            status = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(attempt);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                let outcome = match &result {
                    Ok(resp) => {
                        tracing::Span::current().record("status", resp.status);
                        "response"
                    }
                    Err(TransportError::Timeout { .. }) => "timeout",
                    Err(TransportError::Connect(_)) => "connect_error",
                    Err(TransportError::Request(_)) => "request_error",
                };
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                tracing::debug!(duration_ms, outcome, "attempt complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tower::ServiceExt;

    use super::*;
    use crate::transport::ApiRequest;

    /// Immediately-completing service echoing the attempt number as status.
    struct ImmediateService;

    impl Service<Attempt> for ImmediateService {
        type Response = RawResponse;
        type Error = TransportError;
        type Future = Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, attempt: Attempt) -> Self::Future {
            let status = 200 + u16::try_from(attempt.number).unwrap_or(0);
            Box::pin(async move { Ok(RawResponse::new(status, "")) })
        }
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_response() {
        let svc = MetricsLayer.layer(ImmediateService);
        let attempt = Attempt {
            request: Arc::new(ApiRequest::get("/inventory")),
            number: 2,
            timeout: Duration::from_secs(1),
        };
        let resp = svc.oneshot(attempt).await.unwrap();
        assert_eq!(resp.status, 202);
    }
}
