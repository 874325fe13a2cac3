//! Bodega core: scanned-code classification, location policy, response
//! normalization, and error translation for the warehouse terminal.
//!
//! Everything in this crate is pure; network access lives in `bodega-client`.

pub mod code;
pub mod envelope;
pub mod error_codes;
pub mod history;
pub mod location;
pub mod result;
pub mod translate;
pub mod types;

pub use code::{CodeFormat, CodeFormatError, ValidationError};
pub use envelope::{normalize, normalize_value, Envelope};
pub use error_codes::ErrorKind;
pub use history::{ClockSource, ScanHistory, ScanHistoryEntry, SystemClock};
pub use location::LocationPolicy;
pub use result::{CanonicalResult, Failure};
pub use translate::{translate, translate_failure, ErrorContext, TranslatableError, UserMessage};
pub use types::{EntityType, Location, PendingConfirmation, ScanResult, ScannedCode};
