//! Response normalization.
//!
//! The backend has answered in three shapes over its lifetime. Bodies are
//! detected once into the closed [`Envelope`] union and then folded into a
//! [`CanonicalResult`]:
//!
//! 1. **Unified**: `{ status: "success"|"fail"|"error", message, data?, error?: {..} }`
//! 2. **Legacy**: `{ success: bool, data?, error?: {code, message} | string, message? }`
//! 3. **Passthrough**: any other JSON value, or a non-JSON body wrapped as a string
//!
//! Detection precedence follows that order. [`normalize`] is pure: identical
//! `(status, body)` pairs always produce identical results.

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::error_codes;
use crate::result::{CanonicalResult, Failure};

// ---------------------------------------------------------------------------
// Lenient field helpers
// ---------------------------------------------------------------------------

/// Accepts strings, numbers and booleans as text; `null` becomes `None`.
///
/// Older backend revisions sent numeric error codes (`"code": 404`), which
/// would otherwise make the whole envelope undecodable.
fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Envelope shapes
// ---------------------------------------------------------------------------

/// `status` discriminator of the unified envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnifiedStatus {
    Success,
    Fail,
    Error,
}

/// Structured error object shared by the unified and legacy shapes.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub field: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl ErrorBody {
    fn has_code_or_message(&self) -> bool {
        self.code.as_deref().is_some_and(|c| !c.is_empty())
            || self.message.as_deref().is_some_and(|m| !m.is_empty())
    }
}

/// The `error` member, which legacy endpoints sometimes sent as bare text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ErrorField {
    Structured(ErrorBody),
    Text(String),
    Other(Value),
}

impl ErrorField {
    fn into_body(self) -> ErrorBody {
        match self {
            Self::Structured(body) => body,
            Self::Text(text) => ErrorBody {
                message: Some(text),
                ..ErrorBody::default()
            },
            Self::Other(value) => ErrorBody {
                details: Some(value),
                ..ErrorBody::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnifiedEnvelope {
    pub status: UnifiedStatus,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorField>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorField>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub message: Option<String>,
}

/// A response body after shape detection.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Unified(UnifiedEnvelope),
    /// Carries the original body so payloads without a `data` member survive.
    Legacy(LegacyEnvelope, Value),
    Passthrough(Value),
}

impl Envelope {
    /// Detect the envelope shape of a decoded body.
    #[must_use]
    pub fn detect(body: Value) -> Self {
        if is_unified(&body) {
            match serde_json::from_value::<UnifiedEnvelope>(body.clone()) {
                Ok(envelope) => return Self::Unified(envelope),
                Err(e) => tracing::debug!(error = %e, "unified envelope did not decode"),
            }
        }
        if is_legacy(&body) {
            match serde_json::from_value::<LegacyEnvelope>(body.clone()) {
                Ok(envelope) => return Self::Legacy(envelope, body),
                Err(e) => tracing::debug!(error = %e, "legacy envelope did not decode"),
            }
        }
        Self::Passthrough(body)
    }

    /// Whether the body carries a recognized structured shape.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Passthrough(_))
    }

    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Unified(_) => "unified",
            Self::Legacy(..) => "legacy",
            Self::Passthrough(_) => "passthrough",
        }
    }

    /// Fold into a canonical result. `status` supplies fallback error codes.
    fn into_result(self, status: u16) -> CanonicalResult<Value> {
        match self {
            Self::Unified(envelope) => match envelope.status {
                UnifiedStatus::Success => CanonicalResult::Ok {
                    data: envelope.data.unwrap_or(Value::Null),
                    message: envelope.message,
                },
                UnifiedStatus::Fail | UnifiedStatus::Error => {
                    let body = envelope.error.map(ErrorField::into_body).unwrap_or_default();
                    CanonicalResult::Err(failure_from_body(body, envelope.message, status))
                }
            },
            Self::Legacy(envelope, original) => {
                let raw_error = original.get("error");
                if envelope.success == Some(false) || is_populated_error(raw_error) {
                    let mut body = envelope.error.map(ErrorField::into_body).unwrap_or_default();
                    if !body.has_code_or_message() && is_populated_error(raw_error) {
                        body.details = raw_error.cloned();
                    }
                    CanonicalResult::Err(failure_from_body(body, envelope.message, status))
                } else {
                    CanonicalResult::Ok {
                        data: envelope.data.unwrap_or(original),
                        message: envelope.message,
                    }
                }
            }
            Self::Passthrough(body) => CanonicalResult::ok(body),
        }
    }
}

fn is_unified(body: &Value) -> bool {
    matches!(
        body.get("status").and_then(Value::as_str),
        Some("success" | "fail" | "error")
    )
}

fn is_legacy(body: &Value) -> bool {
    let Some(obj) = body.as_object() else {
        return false;
    };
    obj.get("success").is_some_and(Value::is_boolean) || is_populated_error(obj.get("error"))
}

/// A non-empty `error` object or non-blank `error` text marks a failure,
/// whatever fields the object carries.
fn is_populated_error(error: Option<&Value>) -> bool {
    match error {
        Some(Value::Object(err)) => !err.is_empty(),
        Some(Value::String(text)) => !text.trim().is_empty(),
        _ => false,
    }
}

fn failure_from_body(body: ErrorBody, top_message: Option<String>, status: u16) -> Failure {
    let fallback = status_failure(status);
    let code = body
        .code
        .filter(|c| !c.is_empty())
        .or_else(|| fallback.as_ref().map(|(code, _)| (*code).to_string()))
        .unwrap_or_else(|| error_codes::UNKNOWN_ERROR.to_string());
    let message = body
        .message
        .filter(|m| !m.is_empty())
        .or(top_message.filter(|m| !m.is_empty()))
        .or_else(|| fallback.map(|(_, message)| message.to_string()))
        .unwrap_or_else(|| "Error desconocido".to_string());

    Failure {
        error_code: code,
        message,
        field: body.field,
        suggestion: body.suggestion,
        details: body.details,
    }
}

// ---------------------------------------------------------------------------
// HTTP status fallbacks
// ---------------------------------------------------------------------------

/// Best-effort code and message for a non-2xx status without a structured error.
///
/// Returns `None` for success statuses.
#[must_use]
pub fn status_failure(status: u16) -> Option<(&'static str, &'static str)> {
    let entry = match status {
        200..=299 => return None,
        400 => (error_codes::VALIDATION_ERROR, "Solicitud inválida"),
        401 => (error_codes::UNAUTHORIZED, "Sesión no autorizada"),
        403 => (error_codes::FORBIDDEN, "Acceso denegado"),
        404 => (error_codes::NOT_FOUND, "El servicio solicitado no existe en el servidor"),
        408 => (error_codes::TIMEOUT_ERROR, "El servidor tardó demasiado en responder"),
        409 => (error_codes::CONFLICT, "La operación entra en conflicto con el estado actual"),
        429 => (error_codes::RATE_LIMIT_EXCEEDED, "Demasiadas solicitudes"),
        500 => (error_codes::INTERNAL_ERROR, "Fallo interno del servidor"),
        502..=504 => (error_codes::SERVICE_UNAVAILABLE, "Servicio no disponible"),
        _ => (error_codes::UNKNOWN_ERROR, "Respuesta inesperada del servidor"),
    };
    Some(entry)
}

/// Whether `status` is in the HTTP success range.
#[must_use]
pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Decode a raw body. Empty bodies decode to `null`; non-JSON bodies are
/// wrapped as a JSON string.
#[must_use]
pub fn decode_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Normalize an HTTP status and raw body into the canonical result.
#[must_use]
pub fn normalize(status: u16, body: &[u8]) -> CanonicalResult<Value> {
    normalize_value(status, decode_body(body))
}

/// [`normalize`] for an already-decoded body.
#[must_use]
pub fn normalize_value(status: u16, body: Value) -> CanonicalResult<Value> {
    let envelope = Envelope::detect(body.clone());
    tracing::debug!(status, shape = envelope.shape(), "normalizing response");

    match envelope.into_result(status) {
        CanonicalResult::Ok { .. } if !is_success_status(status) => {
            let (code, message) =
                status_failure(status).unwrap_or((error_codes::UNKNOWN_ERROR, "Error desconocido"));
            CanonicalResult::Err(
                Failure::new(code, message).with_details(json!({ "status": status, "body": body })),
            )
        }
        result => result,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
