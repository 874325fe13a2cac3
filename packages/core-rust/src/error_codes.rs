//! Error codes surfaced to callers and their classification.
//!
//! Codes are plain strings on the wire so the backend can add resource-specific
//! variants (`BOX_NOT_FOUND`, `PALLET_ALREADY_EXISTS`, ...) without a client
//! release. [`ErrorKind::of`] maps any code, known or not, onto the taxonomy.

use serde::Serialize;

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
pub const PARSE_ERROR: &str = "PARSE_ERROR";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const BOX_NOT_FOUND: &str = "BOX_NOT_FOUND";
pub const PALLET_NOT_FOUND: &str = "PALLET_NOT_FOUND";
pub const SALE_NOT_FOUND: &str = "SALE_NOT_FOUND";
pub const LOCATION_NOT_FOUND: &str = "LOCATION_NOT_FOUND";
pub const CONFLICT: &str = "CONFLICT";
pub const BOX_ALREADY_IN_LOCATION: &str = "BOX_ALREADY_IN_LOCATION";
pub const PALLET_ALREADY_EXISTS: &str = "PALLET_ALREADY_EXISTS";
pub const BOX_ALREADY_IN_SALE: &str = "BOX_ALREADY_IN_SALE";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const FORBIDDEN: &str = "FORBIDDEN";
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

// Client-detected.
pub const EMPTY: &str = "EMPTY";
pub const UNRECOGNIZED_FORMAT: &str = "UNRECOGNIZED_FORMAT";
pub const INVALID_LOCATION: &str = "INVALID_LOCATION";
pub const CANCELLED: &str = "CANCELLED";

/// Failure taxonomy shared by every layer above the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Detected on the client or rejected as invalid input. Never retried.
    Validation,
    /// Connection-level failure. Transient.
    Network,
    /// Attempt exceeded its time budget. Transient.
    Timeout,
    /// Application-level: the referenced entity does not exist.
    NotFound,
    /// Application-level: the request contradicts current state.
    Conflict,
    /// Backend failed or is unavailable.
    Server,
    /// Anything unclassified, including cancellation.
    Unknown,
}

impl ErrorKind {
    /// Classify an error code.
    #[must_use]
    pub fn of(code: &str) -> Self {
        match code {
            VALIDATION_ERROR | EMPTY | UNRECOGNIZED_FORMAT | INVALID_LOCATION => Self::Validation,
            NETWORK_ERROR => Self::Network,
            TIMEOUT_ERROR => Self::Timeout,
            INTERNAL_ERROR | SERVICE_UNAVAILABLE | RATE_LIMIT_EXCEEDED | PARSE_ERROR => {
                Self::Server
            }
            c if c == NOT_FOUND || c.ends_with("_NOT_FOUND") => Self::NotFound,
            c if c == CONFLICT
                || c.ends_with("_CONFLICT")
                || c.contains("_ALREADY_") =>
            {
                Self::Conflict
            }
            c if c.ends_with("_INVALID") || c.starts_with("INVALID_") => Self::Validation,
            _ => Self::Unknown,
        }
    }

    /// Whether a failure of this kind may succeed on retry.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_specific_variants_classify_by_suffix() {
        assert_eq!(ErrorKind::of(BOX_NOT_FOUND), ErrorKind::NotFound);
        assert_eq!(ErrorKind::of("DRAFT_SALE_NOT_FOUND"), ErrorKind::NotFound);
        assert_eq!(ErrorKind::of(PALLET_ALREADY_EXISTS), ErrorKind::Conflict);
        assert_eq!(ErrorKind::of("SALE_CONFLICT"), ErrorKind::Conflict);
        assert_eq!(ErrorKind::of("INVALID_QUANTITY"), ErrorKind::Validation);
    }

    #[test]
    fn only_network_and_timeout_are_transient() {
        assert!(ErrorKind::of(NETWORK_ERROR).is_transient());
        assert!(ErrorKind::of(TIMEOUT_ERROR).is_transient());
        assert!(!ErrorKind::of(SERVICE_UNAVAILABLE).is_transient());
        assert!(!ErrorKind::of(BOX_NOT_FOUND).is_transient());
        assert!(!ErrorKind::of("SOMETHING_ODD").is_transient());
    }

    #[test]
    fn unmapped_codes_are_unknown() {
        assert_eq!(ErrorKind::of("SOMETHING_ODD"), ErrorKind::Unknown);
        assert_eq!(ErrorKind::of(CANCELLED), ErrorKind::Unknown);
    }
}
