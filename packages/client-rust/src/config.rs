//! Client configuration.

use std::time::Duration;

use bodega_core::history::DEFAULT_HISTORY_CAPACITY;
use bodega_core::CodeFormat;

/// Timeout and retry behavior of the request executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound for a single attempt.
    pub timeout: Duration,
    /// Retries after the first attempt. Total attempts are `retries + 1`.
    pub retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
    /// Ceiling applied to every backoff delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base_delay * 2^(retry-1)`,
    /// capped at `max_delay`.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(10_000),
            retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Rejected configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("attempt timeout must be greater than zero")]
    ZeroTimeout,
    #[error("max backoff delay ({max_ms}ms) is below the base delay ({base_ms}ms)")]
    BackoffCeilingBelowBase { base_ms: u128, max_ms: u128 },
    #[error("the simulated backend is only available in development builds")]
    SimulatedBackendNotAllowed,
}

/// Top-level configuration for one terminal session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL the endpoint paths are appended to.
    pub base_url: String,
    pub retry: RetryPolicy,
    /// Substitute the in-memory backend for the real one. Development only.
    pub use_simulated_backend: bool,
    /// Entries kept in the scan history.
    pub history_capacity: usize,
    /// Length table used to classify scanned codes.
    pub code_format: CodeFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            retry: RetryPolicy::default(),
            use_simulated_backend: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            code_format: CodeFormat::default(),
        }
    }
}

impl ClientConfig {
    /// Whether this build may run against the simulated backend.
    #[must_use]
    pub fn simulated_backend_allowed() -> bool {
        cfg!(any(debug_assertions, feature = "dev-backend"))
    }

    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_simulated_backend {
            if !Self::simulated_backend_allowed() {
                return Err(ConfigError::SimulatedBackendNotAllowed);
            }
        } else if let Err(e) = reqwest::Url::parse(&self.base_url) {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: e.to_string(),
            });
        }
        if self.retry.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ConfigError::BackoffCeilingBelowBase {
                base_ms: self.retry.base_delay.as_millis(),
                max_ms: self.retry.max_delay.as_millis(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn client_config_defaults() {
        let config = ClientConfig::default();
        assert!(!config.use_simulated_backend);
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.retry.timeout, Duration::from_secs(10));
        assert_eq!(config.retry.retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(5), Duration::from_secs(16));
        assert_eq!(policy.backoff(6), Duration::from_secs(30));
        assert_eq!(policy.backoff(64), Duration::from_secs(30));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = ClientConfig {
            base_url: "::nope".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    fn simulated_backend_allowed_in_debug_builds() {
        let config = ClientConfig {
            use_simulated_backend: true,
            base_url: String::new(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ceiling_below_base_is_rejected() {
        let config = ClientConfig {
            retry: RetryPolicy {
                base_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(1),
                ..RetryPolicy::default()
            },
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BackoffCeilingBelowBase { .. })
        ));
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic_and_bounded(base_ms in 1u64..5_000, ceiling_ms in 5_000u64..60_000, retry in 1u32..40) {
            let policy = RetryPolicy {
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(ceiling_ms),
                ..RetryPolicy::default()
            };
            prop_assert!(policy.backoff(retry) <= policy.max_delay);
            prop_assert!(policy.backoff(retry) <= policy.backoff(retry + 1));
            prop_assert!(policy.backoff(retry) >= policy.base_delay);
        }
    }
}
