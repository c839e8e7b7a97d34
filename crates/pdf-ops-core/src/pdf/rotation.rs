//! Page rotation as a closed set of quarter turns.

use std::fmt;
use std::ops::Add;

use crate::error::{Error, Result};

/// Clockwise page rotation, always one of the four values a `/Rotate`
/// entry may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse a caller-supplied angle.
    ///
    /// Any multiple of 90 is accepted (negative values turn
    /// counter-clockwise) and normalized mod 360. Other angles are rejected.
    pub fn try_from_degrees(degrees: i64) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(Error::InvalidOperands(format!(
                "rotation angle must be a multiple of 90 degrees, got {degrees}"
            )));
        }
        Ok(Self::from_quarter_turns(degrees / 90))
    }

    /// Interpret a `/Rotate` value read from a third-party file.
    ///
    /// Malformed values are rounded to the nearest quarter turn instead of
    /// failing the whole document.
    pub fn from_page_attribute(degrees: i64) -> Self {
        let quarters = (degrees.rem_euclid(360) + 45) / 90;
        Self::from_quarter_turns(quarters)
    }

    fn from_quarter_turns(quarters: i64) -> Self {
        match quarters.rem_euclid(4) {
            1 => Self::Deg90,
            2 => Self::Deg180,
            3 => Self::Deg270,
            _ => Self::Deg0,
        }
    }

    const fn quarter_turns(self) -> i64 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 1,
            Self::Deg180 => 2,
            Self::Deg270 => 3,
        }
    }

    /// Rotation in degrees, as written to `/Rotate`.
    pub const fn degrees(self) -> i64 {
        self.quarter_turns() * 90
    }
}

impl Add for Rotation {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_quarter_turns(self.quarter_turns() + rhs.quarter_turns())
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_degrees_normalizes() {
        assert_eq!(Rotation::try_from_degrees(0).unwrap(), Rotation::Deg0);
        assert_eq!(Rotation::try_from_degrees(90).unwrap(), Rotation::Deg90);
        assert_eq!(Rotation::try_from_degrees(450).unwrap(), Rotation::Deg90);
        assert_eq!(Rotation::try_from_degrees(-90).unwrap(), Rotation::Deg270);
        assert_eq!(Rotation::try_from_degrees(720).unwrap(), Rotation::Deg0);
    }

    #[test]
    fn test_try_from_degrees_rejects_oblique() {
        let err = Rotation::try_from_degrees(45).unwrap_err();
        assert!(matches!(err, Error::InvalidOperands(_)));
    }

    #[test]
    fn test_addition_wraps() {
        assert_eq!(Rotation::Deg90 + Rotation::Deg90, Rotation::Deg180);
        assert_eq!(Rotation::Deg270 + Rotation::Deg180, Rotation::Deg90);
        assert_eq!(Rotation::Deg0 + Rotation::Deg270, Rotation::Deg270);
    }

    #[test]
    fn test_page_attribute_is_lenient() {
        assert_eq!(Rotation::from_page_attribute(-90), Rotation::Deg270);
        assert_eq!(Rotation::from_page_attribute(100), Rotation::Deg90);
        assert_eq!(Rotation::from_page_attribute(359), Rotation::Deg0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Rotation::Deg180.to_string(), "180°");
    }
}
