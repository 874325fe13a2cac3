//! Per-attempt timeout enforcement.
//!
//! An attempt that exceeds its `timeout` is dropped, which cancels the
//! in-flight transport call, and fails with `TransportError::Timeout`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use super::Attempt;
use crate::transport::{RawResponse, TransportError};

// ---------------------------------------------------------------------------
// AttemptTimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that bounds every attempt by `Attempt::timeout`.
#[derive(Debug, Clone)]
pub struct AttemptTimeoutLayer;

impl<S> Layer<S> for AttemptTimeoutLayer {
    type Service = AttemptTimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AttemptTimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// AttemptTimeoutService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AttemptTimeoutService<S> {
    inner: S,
}

impl<S> Service<Attempt> for AttemptTimeoutService<S>
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
        let duration = attempt.timeout;
        let fut = self.inner.call(attempt);
        Box::pin(async move {
            match tokio::time::timeout(duration, fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(TransportError::Timeout {
                    timeout_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
