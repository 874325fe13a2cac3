//! Destination rules per entity type.

use crate::code::ValidationError;
use crate::types::{EntityType, Location};

const BOX_TARGETS: &[Location] = &[
    Location::PACKING,
    Location::BODEGA,
    Location::VENTA,
    Location::TRANSITO,
];

const PALLET_TARGETS: &[Location] = &[
    Location::PACKING,
    Location::BODEGA,
    Location::VENTA,
    Location::TRANSITO,
    Location::PREVENTA,
];

/// Lookup table of valid move destinations.
///
/// Used to pre-validate moves before any network call and to render the
/// destination picker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationPolicy;

impl LocationPolicy {
    /// Allowed destinations for `entity`, in display order.
    #[must_use]
    pub fn valid_locations(self, entity: EntityType) -> &'static [Location] {
        match entity {
            EntityType::Box => BOX_TARGETS,
            EntityType::Pallet => PALLET_TARGETS,
        }
    }

    #[must_use]
    pub fn is_valid_target(self, entity: EntityType, location: Location) -> bool {
        self.valid_locations(entity).contains(&location)
    }

    /// Parse and check a destination typed or picked by the operator.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidLocation`] when the string names no
    /// known location or one not allowed for `entity`.
    pub fn check_target(self, entity: EntityType, location: &str) -> Result<Location, ValidationError> {
        location
            .parse::<Location>()
            .ok()
            .filter(|loc| self.is_valid_target(entity, *loc))
            .ok_or_else(|| ValidationError::InvalidLocation {
                entity: entity.label(),
                location: location.trim().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pallet_set_is_superset_of_box_set() {
        let policy = LocationPolicy;
        for loc in policy.valid_locations(EntityType::Box) {
            assert!(policy.is_valid_target(EntityType::Pallet, *loc));
        }
        assert!(policy.is_valid_target(EntityType::Pallet, Location::PREVENTA));
        assert!(!policy.is_valid_target(EntityType::Box, Location::PREVENTA));
    }

    #[test]
    fn check_target_accepts_allowed_location() {
        assert_eq!(
            LocationPolicy.check_target(EntityType::Box, "bodega"),
            Ok(Location::BODEGA)
        );
    }

    #[test]
    fn check_target_rejects_disallowed_and_unknown() {
        let err = LocationPolicy
            .check_target(EntityType::Box, "PREVENTA")
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_LOCATION");
        assert_eq!(err.field(), "ubicacion");

        assert!(LocationPolicy.check_target(EntityType::Pallet, "ROOF").is_err());
    }
}
