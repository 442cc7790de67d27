//! Fixed catalog of dispense sizes.

use crate::error::{KioskError, Result};

/// A named dispense target: pulses to count and the price shown to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeProfile {
    pub name: &'static str,
    pub display_name: &'static str,
    pub pulses: u32,
    pub price: &'static str,
}

/// Calibrated for the kiosk's flow sensor (~1.08 pulses per ml).
pub const CATALOG: [VolumeProfile; 4] = [
    VolumeProfile {
        name: "100 ml",
        display_name: "100 ml",
        pulses: 108,
        price: "Rp. 3.000",
    },
    VolumeProfile {
        name: "350 ml",
        display_name: "350 ml",
        pulses: 378,
        price: "Rp. 5.000",
    },
    VolumeProfile {
        name: "600 ml",
        display_name: "600 ml",
        pulses: 670,
        price: "Rp. 7.000",
    },
    VolumeProfile {
        name: "1 Liter",
        display_name: "1 Liter",
        pulses: 1080,
        price: "Rp. 15.000",
    },
];

impl VolumeProfile {
    /// Look up a catalog entry by exact name.
    pub fn lookup(name: &str) -> Option<&'static VolumeProfile> {
        CATALOG.iter().find(|v| v.name == name)
    }

    /// Like `lookup`, but an unknown name is a caller error.
    pub fn require(name: &str) -> Result<&'static VolumeProfile> {
        Self::lookup(name).ok_or_else(|| eyre::Report::new(KioskError::UnknownVolume(name.into())))
    }

    pub fn all() -> &'static [VolumeProfile] {
        &CATALOG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_are_unique_and_targets_positive() {
        for (i, a) in CATALOG.iter().enumerate() {
            assert!(a.pulses > 0);
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn lookup_is_exact() {
        assert_eq!(VolumeProfile::lookup("100 ml").map(|v| v.pulses), Some(108));
        assert_eq!(VolumeProfile::lookup("1 Liter").map(|v| v.pulses), Some(1080));
        assert!(VolumeProfile::lookup("100ml").is_none());
        assert!(VolumeProfile::lookup("").is_none());
    }

    #[test]
    fn require_reports_unknown_volume() {
        let err = VolumeProfile::require("2 Liter").unwrap_err();
        assert_eq!(
            err.downcast_ref::<KioskError>(),
            Some(&KioskError::UnknownVolume("2 Liter".into()))
        );
    }
}
