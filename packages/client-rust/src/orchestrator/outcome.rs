//! What a workflow step reports back to the terminal.

use serde::Serialize;
use serde_json::Value;

use bodega_core::{translate_failure, ErrorContext, ErrorKind, Failure, PendingConfirmation, ScanResult};

/// A failure ready for display: translated message plus the raw fields kept
/// for logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailure {
    pub kind: ErrorKind,
    pub error_code: String,
    /// Operator-facing Spanish message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Message as received, before translation.
    pub raw_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ScanFailure {
    #[must_use]
    pub fn from_failure(failure: &Failure, context: Option<ErrorContext>) -> Self {
        let translated = translate_failure(failure, context);
        Self {
            kind: failure.kind(),
            error_code: failure.error_code.clone(),
            message: translated.message,
            suggestion: translated.suggestion,
            field: failure.field.clone(),
            raw_message: failure.message.clone(),
            details: failure.details.clone(),
        }
    }
}

/// Result of one orchestrator call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ScanOutcome {
    /// The move was committed by the backend.
    Committed(ScanResult),
    /// A pallet was accepted and waits for the operator.
    AwaitingConfirmation(PendingConfirmation),
    /// Confirm after a successful commit; nothing was sent.
    AlreadyCommitted(ScanResult),
    IssueReported { code: String, reason: String },
    Failed(ScanFailure),
    /// The step was cancelled; any late backend answer was discarded.
    Cancelled,
}

/// Pallet contents fetched before confirming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PreviewOutcome {
    Contents { code: String, boxes: Vec<String> },
    Failed(ScanFailure),
    Cancelled,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn failure_is_translated_and_raw_kept() {
        let failure = Failure::new("BOX_NOT_FOUND", "Box 1 not found").with_details(json!({"status": 404}));
        let scan = ScanFailure::from_failure(&failure, Some(ErrorContext::Scan));
        assert_eq!(scan.kind, ErrorKind::NotFound);
        assert_eq!(scan.message, "Código no encontrado");
        assert!(scan.suggestion.is_some());
        assert_eq!(scan.raw_message, "Box 1 not found");
        assert_eq!(scan.details, Some(json!({"status": 404})));
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(ScanOutcome::IssueReported {
            code: "123".into(),
            reason: "rota".into(),
        })
        .unwrap();
        assert_eq!(json, json!({"outcome": "issueReported", "code": "123", "reason": "rota"}));
    }
}
