//! Scanned-code classification.
//!
//! Labels are classified by the number of digits they carry. The length table
//! is configuration ([`CodeFormat`]) because the label formats printed on the
//! floor have changed between revisions; the backend owns the authoritative
//! lengths.

use serde::{Deserialize, Serialize};

use crate::error_codes;
use crate::result::Failure;
use crate::types::{EntityType, ScannedCode};

/// Client-side validation failure. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("El código está vacío")]
    Empty,
    #[error(
        "Formato de código no reconocido: \"{raw}\" tiene {digits} dígitos; \
         se esperaban {box_length} dígitos (caja) o {pallet_lengths} dígitos (pallet)"
    )]
    UnrecognizedFormat {
        raw: String,
        digits: usize,
        box_length: usize,
        pallet_lengths: String,
    },
    #[error("La ubicación {location} no es válida para {entity}")]
    InvalidLocation { entity: &'static str, location: String },
}

impl ValidationError {
    /// Wire error code reported in the canonical failure.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => error_codes::EMPTY,
            Self::UnrecognizedFormat { .. } => error_codes::UNRECOGNIZED_FORMAT,
            Self::InvalidLocation { .. } => error_codes::INVALID_LOCATION,
        }
    }

    /// Name of the input field the error refers to.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty | Self::UnrecognizedFormat { .. } => "codigo",
            Self::InvalidLocation { .. } => "ubicacion",
        }
    }

    /// Converts into the canonical failure shape.
    #[must_use]
    pub fn to_failure(&self) -> Failure {
        Failure::new(self.code(), self.to_string()).with_field(self.field())
    }
}

/// Rejected length tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeFormatError {
    #[error("at least one pallet length is required")]
    NoPalletLengths,
    #[error("code lengths must be non-zero")]
    ZeroLength,
    #[error("length {0} is configured for both box and pallet")]
    Overlap(usize),
}

/// Versioned length table mapping digit counts to entity types.
///
/// Exactly one length maps to [`EntityType::Box`]; one or more map to
/// [`EntityType::Pallet`]. Box is checked first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFormat {
    version: u32,
    box_length: usize,
    pallet_lengths: Vec<usize>,
}

impl CodeFormat {
    /// Build a length table.
    ///
    /// # Errors
    ///
    /// Returns [`CodeFormatError`] if no pallet length is given, a length is
    /// zero, or a pallet length equals the box length.
    pub fn new(
        version: u32,
        box_length: usize,
        pallet_lengths: Vec<usize>,
    ) -> Result<Self, CodeFormatError> {
        if pallet_lengths.is_empty() {
            return Err(CodeFormatError::NoPalletLengths);
        }
        if box_length == 0 || pallet_lengths.contains(&0) {
            return Err(CodeFormatError::ZeroLength);
        }
        if pallet_lengths.contains(&box_length) {
            return Err(CodeFormatError::Overlap(box_length));
        }
        let mut pallet_lengths = pallet_lengths;
        pallet_lengths.sort_unstable();
        pallet_lengths.dedup();
        Ok(Self {
            version,
            box_length,
            pallet_lengths,
        })
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn box_length(&self) -> usize {
        self.box_length
    }

    #[must_use]
    pub fn pallet_lengths(&self) -> &[usize] {
        &self.pallet_lengths
    }

    /// Entity type for a digit count, if any.
    #[must_use]
    pub fn entity_for_length(&self, len: usize) -> Option<EntityType> {
        if len == self.box_length {
            Some(EntityType::Box)
        } else if self.pallet_lengths.contains(&len) {
            Some(EntityType::Pallet)
        } else {
            None
        }
    }

    /// Classify a raw scanner reading.
    ///
    /// Surrounding whitespace is ignored and every non-digit character is
    /// dropped before the length lookup. The raw input is kept for messages.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::Empty`] for blank input
    /// - [`ValidationError::UnrecognizedFormat`] when the digit count matches
    ///   no configured length
    pub fn classify(&self, raw: &str) -> Result<ScannedCode, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }

        let normalized: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        match self.entity_for_length(normalized.len()) {
            Some(entity_type) => Ok(ScannedCode {
                raw: raw.to_string(),
                normalized,
                entity_type,
            }),
            None => Err(ValidationError::UnrecognizedFormat {
                raw: trimmed.to_string(),
                digits: normalized.len(),
                box_length: self.box_length,
                pallet_lengths: self.pallet_lengths_label(),
            }),
        }
    }

    fn pallet_lengths_label(&self) -> String {
        self.pallet_lengths
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" o ")
    }
}

impl Default for CodeFormat {
    /// Label revision 3: 15-digit boxes, 12- and 16-digit pallets.
    fn default() -> Self {
        Self {
            version: 3,
            box_length: 15,
            pallet_lengths: vec![12, 16],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
