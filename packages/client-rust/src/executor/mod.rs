//! Resilient request execution.
//!
//! Every logical request is driven through the attempt pipeline (see
//! [`pipeline::build_attempt_pipeline`]) up to `retries + 1` times. Only
//! transient failures are retried; anything carrying a structured backend
//! answer is handed back untouched so the normalizer can read it.

pub mod metrics;
pub mod pipeline;
pub mod timeout;

use std::sync::Arc;
use std::time::Duration;

use bodega_core::envelope::decode_body;
use bodega_core::{error_codes, Envelope, Failure};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::transport::{ApiRequest, RawResponse, Transport, TransportError};

pub use self::pipeline::{build_attempt_pipeline, AttemptService};

/// One try of a logical request.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub request: Arc<ApiRequest>,
    /// 1-based attempt number.
    pub number: u32,
    pub timeout: Duration,
}

/// Why a logical request produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecuteError {
    #[error("request cancelled")]
    Cancelled,
    #[error("request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },
    #[error("network failure after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },
    #[error("request could not be sent: {0}")]
    Transport(String),
}

impl ExecuteError {
    /// Canonical failure for this error, with a user-facing Spanish message.
    #[must_use]
    pub fn to_failure(&self) -> Failure {
        match self {
            Self::Cancelled => Failure::new(error_codes::CANCELLED, "Operación cancelada"),
            Self::Timeout { attempts } => Failure::new(
                error_codes::TIMEOUT_ERROR,
                "La solicitud tardó demasiado en responder",
            )
            .with_details(serde_json::json!({ "attempts": attempts })),
            Self::Network { attempts, message } => Failure::new(
                error_codes::NETWORK_ERROR,
                "No se pudo conectar con el servidor",
            )
            .with_details(serde_json::json!({ "attempts": attempts, "cause": message })),
            Self::Transport(message) => {
                Failure::new(error_codes::UNKNOWN_ERROR, "No se pudo enviar la solicitud")
                    .with_details(serde_json::json!({ "cause": message }))
            }
        }
    }
}

/// Gateway-class statuses retried when the body is not a backend envelope.
fn is_gateway_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

/// A response is retried only when a proxy, not the backend, produced it.
fn is_transient_response(response: &RawResponse) -> bool {
    is_gateway_status(response.status) && !Envelope::detect(decode_body(&response.body)).is_structured()
}

// ---------------------------------------------------------------------------
// RequestExecutor
// ---------------------------------------------------------------------------

/// Retry loop over the attempt pipeline.
#[derive(Clone)]
pub struct RequestExecutor {
    policy: RetryPolicy,
    service: AttemptService,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    /// Creates an executor that sends attempts through `transport`.
    pub fn new<T>(transport: Arc<T>, policy: RetryPolicy) -> Self
    where
        T: Transport + ?Sized + 'static,
    {
        Self {
            policy,
            service: build_attempt_pipeline(transport),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `request` with timeout, retry, and cancellation.
    ///
    /// Returns the raw response of the first non-transient attempt, or of the
    /// last attempt when a gateway response persists.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::Cancelled`] as soon as `cancel` fires, and a
    /// timeout or network error once the attempts are exhausted.
    pub async fn execute(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, ExecuteError> {
        let timeout = request.timeout.unwrap_or(self.policy.timeout);
        let request = Arc::new(request);
        let max_attempts = self.policy.max_attempts();
        let mut number = 0u32;

        loop {
            number += 1;
            let attempt = Attempt {
                request: Arc::clone(&request),
                number,
                timeout,
            };

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ExecuteError::Cancelled),
                result = self.service.clone().oneshot(attempt) => result,
            };

            let retry_reason = match result {
                Ok(response) if is_transient_response(&response) && number < max_attempts => {
                    format!("gateway status {}", response.status)
                }
                Ok(response) => return Ok(response),
                Err(err) if !err.is_transient() => {
                    return Err(ExecuteError::Transport(err.to_string()));
                }
                Err(err) if number >= max_attempts => {
                    debug!(request_id = %request.request_id, attempts = number, error = %err, "attempts exhausted");
                    return Err(match err {
                        TransportError::Timeout { .. } => ExecuteError::Timeout { attempts: number },
                        other => ExecuteError::Network {
                            attempts: number,
                            message: other.to_string(),
                        },
                    });
                }
                Err(err) => err.to_string(),
            };

            let delay = self.policy.backoff(number);
            warn!(
                request_id = %request.request_id,
                path = %request.path,
                attempt = number,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                reason = %retry_reason,
                "retrying request"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ExecuteError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
