//! Pipeline composition: wraps a [`Transport`] in the attempt middleware stack.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceBuilder};

use super::metrics::MetricsLayer;
use super::timeout::AttemptTimeoutLayer;
use super::Attempt;
use crate::transport::{RawResponse, Transport, TransportError};

/// Type-erased attempt pipeline, cheap to clone per attempt and shareable across tasks.
pub type AttemptService = BoxCloneSyncService<Attempt, RawResponse, TransportError>;

// ---------------------------------------------------------------------------
// TransportService
// ---------------------------------------------------------------------------

/// Adapts a [`Transport`] into a `tower::Service<Attempt>`.
pub struct TransportService<T: ?Sized> {
    transport: Arc<T>,
}

impl<T: ?Sized> TransportService<T> {
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }
}

impl<T: ?Sized> Clone for TransportService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T> Service<Attempt> for TransportService<T>
where
    T: Transport + ?Sized + 'static,
{
    type Response = RawResponse;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, attempt: Attempt) -> Self::Future {
        let transport = Arc::clone(&self.transport);
        Box::pin(async move { transport.send(&attempt.request).await })
    }
}

/// Build the attempt pipeline around a transport.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- span per attempt, so timeouts are recorded as outcomes
/// 2. `AttemptTimeoutLayer` -- bound the attempt, dropping the call on expiry
#[must_use]
pub fn build_attempt_pipeline<T>(transport: Arc<T>) -> AttemptService
where
    T: Transport + ?Sized + 'static,
{
    BoxCloneSyncService::new(
        ServiceBuilder::new()
            .layer(MetricsLayer)
            .layer(AttemptTimeoutLayer)
            .service(TransportService::new(transport)),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
