use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two kinds of scannable entity on the warehouse floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A single labelled box.
    Box,
    /// A pallet aggregating many boxes.
    Pallet,
}

impl EntityType {
    /// Resource name used by the consolidated endpoints (`{ resource, .. }`).
    #[must_use]
    pub fn resource(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Pallet => "pallet",
        }
    }

    /// Human-readable (Spanish) label shown on the terminal.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Box => "caja",
            Self::Pallet => "pallet",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

/// Named warehouse zone a box or pallet can be moved to.
///
/// Variant names use `SCREAMING_CASE` to match the backend wire format exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum Location {
    PACKING,
    BODEGA,
    VENTA,
    TRANSITO,
    PREVENTA,
}

impl Location {
    /// Every known location, in display order.
    pub const ALL: [Location; 5] = [
        Location::PACKING,
        Location::BODEGA,
        Location::VENTA,
        Location::TRANSITO,
        Location::PREVENTA,
    ];

    /// Wire name of the location.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PACKING => "PACKING",
            Self::BODEGA => "BODEGA",
            Self::VENTA => "VENTA",
            Self::TRANSITO => "TRANSITO",
            Self::PREVENTA => "PREVENTA",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known [`Location`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown location: {0}")]
pub struct UnknownLocation(pub String);

impl FromStr for Location {
    type Err = UnknownLocation;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|loc| loc.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownLocation(s.to_string()))
    }
}

/// A scanned label that passed classification.
///
/// `normalized` holds only ASCII digits and `entity_type` is derived from
/// its length alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedCode {
    /// Input exactly as the scanner delivered it.
    pub raw: String,
    /// Digits-only form sent to the backend.
    pub normalized: String,
    pub entity_type: EntityType,
}

/// A pallet that was scanned and waits for the operator to confirm the move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConfirmation {
    pub code: ScannedCode,
    pub requested_location: Location,
}

impl PendingConfirmation {
    /// Always [`EntityType::Pallet`]; only pallets go through confirmation.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.code.entity_type
    }
}

/// Payload of a committed move.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub code: ScannedCode,
    pub location: Location,
    /// Backend payload returned by the move call.
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_parses_case_insensitively() {
        assert_eq!("bodega".parse::<Location>().unwrap(), Location::BODEGA);
        assert_eq!(" Transito ".parse::<Location>().unwrap(), Location::TRANSITO);
        assert!("ROOF".parse::<Location>().is_err());
    }

    #[test]
    fn location_serializes_to_wire_name() {
        let json = serde_json::to_string(&Location::PREVENTA).unwrap();
        assert_eq!(json, "\"PREVENTA\"");
    }

    #[test]
    fn scanned_code_uses_camel_case() {
        let code = ScannedCode {
            raw: " 123 ".to_string(),
            normalized: "123".to_string(),
            entity_type: EntityType::Box,
        };
        let json = serde_json::to_value(&code).unwrap();
        assert_eq!(json["entityType"], "box");
        assert_eq!(json["normalized"], "123");
    }
}
