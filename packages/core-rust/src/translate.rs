//! Operator-facing error messages.
//!
//! [`translate`] turns a raw failure into a short Spanish message plus an
//! optional suggestion. Resolution order, first match wins:
//!
//! 1. context table by error code
//! 2. context table by message substring
//! 3. general table by error code
//! 4. general table by message substring
//! 5. the raw message verbatim, when it already reads as Spanish prose
//! 6. the raw message with technical prefixes stripped
//!
//! A suggestion sent by the backend always replaces the table suggestion.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error_codes as codes;
use crate::result::Failure;

const GENERIC_MESSAGE: &str = "Ocurrió un error inesperado";

/// Operation the failing call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorContext {
    Scan,
    Move,
    Create,
    Dispatch,
    Sale,
    Report,
}

/// Borrowed view of an error to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TranslatableError<'a> {
    pub code: Option<&'a str>,
    pub message: &'a str,
    /// Suggestion supplied by the backend.
    pub suggestion: Option<&'a str>,
}

impl<'a> From<&'a Failure> for TranslatableError<'a> {
    fn from(failure: &'a Failure) -> Self {
        Self {
            code: Some(failure.error_code.as_str()),
            message: &failure.message,
            suggestion: failure.suggestion.as_deref(),
        }
    }
}

/// Displayable message and suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Table entry. `message: None` keeps the cleaned raw message and only adds
/// the suggestion (used where the raw text carries specifics worth showing).
#[derive(Debug, Clone, Copy)]
struct Translation {
    message: Option<&'static str>,
    suggestion: Option<&'static str>,
}

const fn t(message: &'static str, suggestion: &'static str) -> Translation {
    Translation {
        message: Some(message),
        suggestion: Some(suggestion),
    }
}

const fn msg(message: &'static str) -> Translation {
    Translation {
        message: Some(message),
        suggestion: None,
    }
}

const fn hint(suggestion: &'static str) -> Translation {
    Translation {
        message: None,
        suggestion: Some(suggestion),
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

const CONTEXT_BY_CODE: &[(ErrorContext, &str, Translation)] = &[
    (ErrorContext::Scan, codes::BOX_NOT_FOUND, t("Código no encontrado", "Verifique que la etiqueta esté completa y vuelva a escanear")),
    (ErrorContext::Scan, codes::PALLET_NOT_FOUND, t("Pallet no encontrado", "Verifique el código o cree el pallet antes de moverlo")),
    (ErrorContext::Scan, codes::NOT_FOUND, t("Código no encontrado", "Verifique que la etiqueta esté completa y vuelva a escanear")),
    (ErrorContext::Move, codes::BOX_NOT_FOUND, t("La caja no existe en el sistema", "Registre la caja en recepción antes de moverla")),
    (ErrorContext::Move, codes::PALLET_NOT_FOUND, t("El pallet no existe en el sistema", "Cree el pallet antes de moverlo")),
    (ErrorContext::Move, codes::BOX_ALREADY_IN_LOCATION, t("La caja ya está en esa ubicación", "Elija otra ubicación de destino")),
    (ErrorContext::Move, codes::LOCATION_NOT_FOUND, t("Ubicación desconocida", "Elija una de las ubicaciones permitidas")),
    (ErrorContext::Move, codes::INVALID_LOCATION, hint("Elija una de las ubicaciones permitidas")),
    (ErrorContext::Create, codes::PALLET_ALREADY_EXISTS, t("El pallet ya existe", "Use el pallet existente o escanee otro código")),
    (ErrorContext::Create, codes::CONFLICT, t("El pallet ya fue creado", "Use el pallet existente o escanee otro código")),
    (ErrorContext::Dispatch, codes::NOT_FOUND, t("Despacho no encontrado", "Actualice la lista de despachos")),
    (ErrorContext::Dispatch, codes::CONFLICT, t("El despacho ya fue procesado", "Actualice la lista de despachos")),
    (ErrorContext::Sale, codes::SALE_NOT_FOUND, t("Venta no encontrada", "Actualice la lista de ventas en borrador")),
    (ErrorContext::Sale, codes::BOX_ALREADY_IN_SALE, t("La caja ya pertenece a otra venta", "Retírela de la venta anterior primero")),
    (ErrorContext::Sale, codes::BOX_NOT_FOUND, t("La caja no existe en el sistema", "Verifique el código de la caja")),
    (ErrorContext::Report, codes::NOT_FOUND, t("No se encontró el elemento a reportar", "Verifique el código escaneado")),
];

/// Needles are matched lowercase against the lowercased raw message.
const CONTEXT_BY_TEXT: &[(ErrorContext, &str, Translation)] = &[
    (ErrorContext::Scan, "no existe", t("Código no encontrado", "Verifique que la etiqueta esté completa y vuelva a escanear")),
    (ErrorContext::Move, "same location", t("La caja ya está en esa ubicación", "Elija otra ubicación de destino")),
    (ErrorContext::Move, "misma ubicaci", t("La caja ya está en esa ubicación", "Elija otra ubicación de destino")),
    (ErrorContext::Create, "duplicate", t("El pallet ya existe", "Use el pallet existente o escanee otro código")),
    (ErrorContext::Create, "already exists", t("El pallet ya existe", "Use el pallet existente o escanee otro código")),
    (ErrorContext::Sale, "confirmed", t("La venta ya fue confirmada", "Cree una nueva venta en borrador")),
    (ErrorContext::Sale, "confirmada", t("La venta ya fue confirmada", "Cree una nueva venta en borrador")),
];

const GENERAL_BY_CODE: &[(&str, Translation)] = &[
    (codes::VALIDATION_ERROR, t("Datos inválidos", "Revise los datos ingresados")),
    (codes::NETWORK_ERROR, t("Sin conexión con el servidor", "Verifique la conexión de red del terminal e intente nuevamente")),
    (codes::TIMEOUT_ERROR, t("El servidor no respondió a tiempo", "Intente nuevamente en unos segundos")),
    (codes::PARSE_ERROR, t("Respuesta del servidor no válida", "Contacte a soporte si el problema persiste")),
    (codes::NOT_FOUND, msg("Recurso no encontrado")),
    (codes::BOX_NOT_FOUND, t("Caja no encontrada", "Verifique el código de la caja")),
    (codes::PALLET_NOT_FOUND, t("Pallet no encontrado", "Verifique el código del pallet")),
    (codes::SALE_NOT_FOUND, t("Venta no encontrada", "Actualice la lista de ventas")),
    (codes::BOX_ALREADY_IN_LOCATION, t("La caja ya está en esa ubicación", "Elija otra ubicación de destino")),
    (codes::LOCATION_NOT_FOUND, t("Ubicación desconocida", "Elija una de las ubicaciones permitidas")),
    (codes::PALLET_ALREADY_EXISTS, t("El pallet ya existe", "Use el pallet existente o escanee otro código")),
    (codes::BOX_ALREADY_IN_SALE, t("La caja ya pertenece a otra venta", "Retírela de la venta anterior primero")),
    (codes::CONFLICT, t("La operación entra en conflicto con el estado actual", "Actualice la información e intente nuevamente")),
    (codes::INTERNAL_ERROR, t("Error interno del servidor", "Intente nuevamente; si persiste, contacte a soporte")),
    (codes::SERVICE_UNAVAILABLE, t("Servicio no disponible", "Espere unos minutos e intente nuevamente")),
    (codes::RATE_LIMIT_EXCEEDED, t("Demasiadas solicitudes", "Espere un momento antes de reintentar")),
    (codes::UNAUTHORIZED, t("Sesión expirada", "Inicie sesión nuevamente")),
    (codes::FORBIDDEN, t("No tiene permisos para esta operación", "Solicite acceso a un supervisor")),
    (codes::EMPTY, msg("Escanee o ingrese un código")),
    (codes::UNRECOGNIZED_FORMAT, hint("Verifique que la etiqueta no esté dañada y vuelva a escanear")),
    (codes::INVALID_LOCATION, hint("Elija una de las ubicaciones permitidas")),
    (codes::CANCELLED, msg("Operación cancelada")),
];

const GENERAL_BY_TEXT: &[(&str, Translation)] = &[
    ("failed to fetch", t("Sin conexión con el servidor", "Verifique la conexión de red del terminal e intente nuevamente")),
    ("connection refused", t("Sin conexión con el servidor", "Verifique la conexión de red del terminal e intente nuevamente")),
    ("network", t("Sin conexión con el servidor", "Verifique la conexión de red del terminal e intente nuevamente")),
    ("timed out", t("El servidor no respondió a tiempo", "Intente nuevamente en unos segundos")),
    ("timeout", t("El servidor no respondió a tiempo", "Intente nuevamente en unos segundos")),
    ("unexpected token", t("Respuesta del servidor no válida", "Contacte a soporte si el problema persiste")),
    ("not found", msg("Recurso no encontrado")),
    ("duplicate", t("El registro ya existe", "Actualice la información e intente nuevamente")),
];

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

static TECHNICAL_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:exception|traceback|undefined|\berror\s*:|\n\s*at\s|\bat\s+[\w.$<>]+\s*\()|\[[A-Z0-9_.-]+\]")
        .expect("valid marker regex")
});

static TECHNICAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*(?:[A-Za-z_][\w.]*(?:Error|Exception)|Error|Exception|Uncaught|Fatal)\s*:\s*|\s*\[[A-Za-z0-9_.-]+\]\s*)+")
        .expect("valid prefix regex")
});

fn has_diacritics(text: &str) -> bool {
    text.chars().any(|c| "áéíóúñüÁÉÍÓÚÑÜ¿¡".contains(c))
}

fn looks_like_prose(text: &str) -> bool {
    has_diacritics(text) && !TECHNICAL_MARKERS.is_match(text)
}

/// Strip exception prefixes and bracketed codes, keep the first line.
fn clean_message(raw: &str) -> String {
    let first_line = raw.trim().lines().next().unwrap_or_default();
    TECHNICAL_PREFIX.replace(first_line, "").trim().to_string()
}

// ---------------------------------------------------------------------------
// translate
// ---------------------------------------------------------------------------

fn lookup(error: &TranslatableError<'_>, context: Option<ErrorContext>) -> Option<Translation> {
    let code = error.code.filter(|c| !c.is_empty());
    let text = error.message.to_lowercase();

    let by_context_code = || {
        let (ctx, code) = (context?, code?);
        CONTEXT_BY_CODE
            .iter()
            .find(|(c, k, _)| *c == ctx && *k == code)
            .map(|(.., tr)| *tr)
    };
    let by_context_text = || {
        let ctx = context?;
        CONTEXT_BY_TEXT
            .iter()
            .find(|(c, needle, _)| *c == ctx && text.contains(needle))
            .map(|(.., tr)| *tr)
    };
    let by_code = || {
        let code = code?;
        GENERAL_BY_CODE
            .iter()
            .find(|(k, _)| *k == code)
            .map(|(_, tr)| *tr)
    };
    let by_text = || {
        GENERAL_BY_TEXT
            .iter()
            .find(|(needle, _)| text.contains(needle))
            .map(|(_, tr)| *tr)
    };

    by_context_code()
        .or_else(by_context_text)
        .or_else(by_code)
        .or_else(by_text)
}

fn fallback_message(raw: &str) -> String {
    if looks_like_prose(raw) {
        return raw.trim().to_string();
    }
    let cleaned = clean_message(raw);
    if cleaned.is_empty() {
        GENERIC_MESSAGE.to_string()
    } else {
        cleaned
    }
}

/// Translate an error into an operator-facing message.
///
/// Pure and total: every input yields a displayable message.
#[must_use]
pub fn translate(error: &TranslatableError<'_>, context: Option<ErrorContext>) -> UserMessage {
    let backend_suggestion = error
        .suggestion
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    match lookup(error, context) {
        Some(tr) => UserMessage {
            message: tr
                .message
                .map_or_else(|| fallback_message(error.message), ToString::to_string),
            suggestion: backend_suggestion.or_else(|| tr.suggestion.map(ToString::to_string)),
        },
        None => UserMessage {
            message: fallback_message(error.message),
            suggestion: backend_suggestion,
        },
    }
}

/// Shorthand for translating a canonical [`Failure`].
#[must_use]
pub fn translate_failure(failure: &Failure, context: Option<ErrorContext>) -> UserMessage {
    translate(&TranslatableError::from(failure), context)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn err<'a>(code: &'a str, message: &'a str) -> TranslatableError<'a> {
        TranslatableError {
            code: Some(code),
            message,
            suggestion: None,
        }
    }

    #[test]
    fn box_not_found_while_scanning() {
        let out = translate(&err("BOX_NOT_FOUND", "Box 123 not in db"), Some(ErrorContext::Scan));
        assert_eq!(out.message, "Código no encontrado");
        assert_eq!(
            out.suggestion.as_deref(),
            Some("Verifique que la etiqueta esté completa y vuelva a escanear")
        );
    }

    #[test]
    fn context_changes_the_message() {
        let scan = translate(&err("BOX_NOT_FOUND", ""), Some(ErrorContext::Scan));
        let mv = translate(&err("BOX_NOT_FOUND", ""), Some(ErrorContext::Move));
        let none = translate(&err("BOX_NOT_FOUND", ""), None);
        assert_ne!(scan.message, mv.message);
        assert_eq!(none.message, "Caja no encontrada");
    }

    #[test]
    fn context_text_beats_general_code() {
        let out = translate(
            &err("CONFLICT", "Sale already confirmed"),
            Some(ErrorContext::Sale),
        );
        assert_eq!(out.message, "La venta ya fue confirmada");
    }

    #[test]
    fn general_text_match() {
        let out = translate(&err("WHATEVER", "TypeError: Failed to fetch"), None);
        assert_eq!(out.message, "Sin conexión con el servidor");
    }

    #[test]
    fn backend_suggestion_wins() {
        let error = TranslatableError {
            code: Some("BOX_NOT_FOUND"),
            message: "x",
            suggestion: Some("Llame al supervisor"),
        };
        let out = translate(&error, Some(ErrorContext::Scan));
        assert_eq!(out.message, "Código no encontrado");
        assert_eq!(out.suggestion.as_deref(), Some("Llame al supervisor"));
    }

    #[test]
    fn blank_backend_suggestion_does_not_win() {
        let error = TranslatableError {
            code: Some("NETWORK_ERROR"),
            message: "",
            suggestion: Some("  "),
        };
        let out = translate(&error, None);
        assert!(out.suggestion.unwrap().starts_with("Verifique"));
    }

    #[test]
    fn spanish_prose_is_kept_verbatim() {
        let out = translate(&err("SOMETHING_NEW", "La caja está bloqueada por inventario"), None);
        assert_eq!(out.message, "La caja está bloqueada por inventario");
        assert!(out.suggestion.is_none());
    }

    #[test]
    fn technical_prose_is_cleaned() {
        let out = translate(
            &err("SOMETHING_NEW", "SQLException: violación de restricción\n    at db.run (x.js:1)"),
            None,
        );
        assert_eq!(out.message, "violación de restricción");
    }

    #[test]
    fn lowercase_brackets_in_spanish_prose_are_not_technical() {
        let raw = "No se puede mover la [caja] a la misma ubicación";
        let out = translate(&err("SOMETHING_NEW", raw), None);
        assert_eq!(out.message, raw);

        let coded = translate(&err("SOMETHING_NEW", "[E42] ubicación bloqueada"), None);
        assert_eq!(coded.message, "ubicación bloqueada");
    }

    #[test]
    fn resource_codes_translate_outside_their_context() {
        let out = translate(
            &err("BOX_ALREADY_IN_LOCATION", "Box already in the same location"),
            Some(ErrorContext::Scan),
        );
        assert_eq!(out.message, "La caja ya está en esa ubicación");
        assert_eq!(out.suggestion.as_deref(), Some("Elija otra ubicación de destino"));

        for code in ["LOCATION_NOT_FOUND", "PALLET_ALREADY_EXISTS", "BOX_ALREADY_IN_SALE"] {
            let out = translate(&err(code, "raw english text"), Some(ErrorContext::Scan));
            assert_ne!(out.message, "raw english text", "{code}");
            assert!(out.suggestion.is_some(), "{code}");
        }
    }

    #[test]
    fn bracketed_codes_are_stripped() {
        let out = translate(&err("", "[E42] Error: pallet locked"), None);
        assert_eq!(out.message, "pallet locked");
    }

    #[test]
    fn unrecognized_format_keeps_specifics_and_adds_hint() {
        let raw = "Formato de código no reconocido: \"12\" tiene 2 dígitos";
        let out = translate(&err("UNRECOGNIZED_FORMAT", raw), Some(ErrorContext::Scan));
        assert_eq!(out.message, raw);
        assert!(out.suggestion.is_some());
    }

    #[test]
    fn empty_everything_yields_generic_message() {
        let out = translate(&TranslatableError::default(), None);
        assert_eq!(out.message, GENERIC_MESSAGE);
    }

    #[test]
    fn every_table_entry_translates() {
        for (ctx, code, _) in CONTEXT_BY_CODE {
            let out = translate(&err(code, "raw"), Some(*ctx));
            assert!(!out.message.is_empty());
        }
        for (code, _) in GENERAL_BY_CODE {
            for ctx in [
                None,
                Some(ErrorContext::Scan),
                Some(ErrorContext::Move),
                Some(ErrorContext::Create),
                Some(ErrorContext::Dispatch),
                Some(ErrorContext::Sale),
                Some(ErrorContext::Report),
            ] {
                let out = translate(&err(code, "raw"), ctx);
                assert!(!out.message.is_empty());
            }
        }
    }

    proptest! {
        #[test]
        fn total_and_pure(code in ".{0,20}", message in "(?s).{0,80}", with_hint in any::<bool>()) {
            let error = TranslatableError {
                code: Some(code.as_str()),
                message: &message,
                suggestion: with_hint.then_some("hint"),
            };
            let a = translate(&error, Some(ErrorContext::Move));
            let b = translate(&error, Some(ErrorContext::Move));
            prop_assert!(!a.message.is_empty());
            prop_assert_eq!(&a, &b);
            if with_hint {
                prop_assert_eq!(a.suggestion.as_deref(), Some("hint"));
            }
        }
    }
}
