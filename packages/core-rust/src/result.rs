//! The canonical success/failure shape every layer above the transport consumes.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error_codes::ErrorKind;

/// Structured failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Suggestion supplied by the backend, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Raw diagnostic payload. Logged, never shown to the operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Failure {
    #[must_use]
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            field: None,
            suggestion: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::of(&self.error_code)
    }
}

/// Normalized outcome of one logical call.
///
/// Exactly one of the two shapes; `data` and `error_code` never coexist.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalResult<T> {
    Ok { data: T, message: Option<String> },
    Err(Failure),
}

impl<T> CanonicalResult<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self::Ok {
            data,
            message: None,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Ok { .. } => None,
            Self::Err(failure) => Some(failure),
        }
    }

    #[must_use]
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Ok { data, .. } => Some(data),
            Self::Err(_) => None,
        }
    }

    /// Map the success payload, keeping the message.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CanonicalResult<U> {
        match self {
            Self::Ok { data, message } => CanonicalResult::Ok {
                data: f(data),
                message,
            },
            Self::Err(failure) => CanonicalResult::Err(failure),
        }
    }

    /// Convert into a plain `Result`, dropping the success message.
    ///
    /// # Errors
    ///
    /// Returns the [`Failure`] for the failure variant.
    pub fn into_result(self) -> Result<T, Failure> {
        match self {
            Self::Ok { data, .. } => Ok(data),
            Self::Err(failure) => Err(failure),
        }
    }
}

impl<T> From<Failure> for CanonicalResult<T> {
    fn from(failure: Failure) -> Self {
        Self::Err(failure)
    }
}

/// Serializes to `{ "ok": true, "data", "message"? }` or
/// `{ "ok": false, "errorCode", "message", "field"?, "suggestion"?, "details"? }`.
impl<T: Serialize> Serialize for CanonicalResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Ok { data, message } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("data", data)?;
                if let Some(message) = message {
                    map.serialize_entry("message", message)?;
                }
                map.end()
            }
            Self::Err(failure) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("errorCode", &failure.error_code)?;
                map.serialize_entry("message", &failure.message)?;
                if let Some(field) = &failure.field {
                    map.serialize_entry("field", field)?;
                }
                if let Some(suggestion) = &failure.suggestion {
                    map.serialize_entry("suggestion", suggestion)?;
                }
                if let Some(details) = &failure.details {
                    map.serialize_entry("details", details)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ok_serializes_without_error_fields() {
        let result = CanonicalResult::Ok {
            data: json!({"id": 1}),
            message: Some("listo".to_string()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({"ok": true, "data": {"id": 1}, "message": "listo"}));
    }

    #[test]
    fn failure_serializes_without_data() {
        let result: CanonicalResult<()> =
            Failure::new("BOX_NOT_FOUND", "no existe").with_field("codigo").into();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"ok": false, "errorCode": "BOX_NOT_FOUND", "message": "no existe", "field": "codigo"})
        );
        assert!(value.get("data").is_none());
    }

    #[test]
    fn map_preserves_failure() {
        let result: CanonicalResult<u32> = Failure::new("CONFLICT", "x").into();
        let mapped = result.map(|n| n + 1);
        assert_eq!(mapped.failure().map(|f| f.error_code.as_str()), Some("CONFLICT"));
    }
}
