//! Change masks: which fields of a reading are worth publishing.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Bitmask over the publishable measurement fields of a reading.
///
/// Produced by the change tracker, consumed by the serializer: only the
/// fields whose bit is set end up in the payload. An empty mask means the
/// reading carries nothing new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeMask(u8);

impl ChangeMask {
    pub const TEMPERATURE: ChangeMask = ChangeMask(0b001);
    pub const HUMIDITY: ChangeMask = ChangeMask(0b010);
    pub const BATTERY: ChangeMask = ChangeMask(0b100);

    /// No fields selected.
    pub const fn empty() -> Self {
        ChangeMask(0)
    }

    /// Every field selected; the "always publish" override value.
    pub const fn all() -> Self {
        ChangeMask(0b111)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: ChangeMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ChangeMask) {
        self.0 |= other.0;
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }
}

impl BitOr for ChangeMask {
    type Output = ChangeMask;

    fn bitor(self, rhs: ChangeMask) -> ChangeMask {
        ChangeMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeMask {
    fn bitor_assign(&mut self, rhs: ChangeMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ChangeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        if self.contains(ChangeMask::TEMPERATURE) {
            f.write_str("t")?;
        }
        if self.contains(ChangeMask::HUMIDITY) {
            f.write_str("h")?;
        }
        if self.contains(ChangeMask::BATTERY) {
            f.write_str("b")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_all() {
        assert!(ChangeMask::empty().is_empty());
        assert!(!ChangeMask::all().is_empty());
        assert!(ChangeMask::all().contains(ChangeMask::TEMPERATURE));
        assert!(ChangeMask::all().contains(ChangeMask::HUMIDITY));
        assert!(ChangeMask::all().contains(ChangeMask::BATTERY));
    }

    #[test]
    fn test_compose() {
        let mut mask = ChangeMask::TEMPERATURE | ChangeMask::BATTERY;
        assert!(mask.contains(ChangeMask::TEMPERATURE));
        assert!(!mask.contains(ChangeMask::HUMIDITY));
        mask |= ChangeMask::HUMIDITY;
        assert_eq!(mask, ChangeMask::all());
    }

    #[test]
    fn test_insert() {
        let mut mask = ChangeMask::empty();
        mask.insert(ChangeMask::HUMIDITY);
        assert_eq!(mask, ChangeMask::HUMIDITY);
        mask.insert(ChangeMask::HUMIDITY);
        assert_eq!(mask, ChangeMask::HUMIDITY);
    }

    #[test]
    fn test_contains_needs_all_requested_bits() {
        let mask = ChangeMask::TEMPERATURE;
        assert!(!mask.contains(ChangeMask::TEMPERATURE | ChangeMask::HUMIDITY));
        assert!(ChangeMask::empty().contains(ChangeMask::empty()));
    }

    #[test]
    fn test_display() {
        assert_eq!(ChangeMask::empty().to_string(), "none");
        assert_eq!(ChangeMask::all().to_string(), "thb");
        assert_eq!((ChangeMask::TEMPERATURE | ChangeMask::BATTERY).to_string(), "tb");
    }
}
