//! Lens power value type.

use serde::{Deserialize, Serialize};

/// A lens power (sphere or cylinder) in hundredths of a diopter.
///
/// Stored as a signed integer to keep equality exact: `-2.00` is `-200`,
/// `+1.25` is `125`. Line-to-option matching relies on exact equality of
/// these values, so no floating point representation is ever used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diopter(i32);

impl Diopter {
    /// Creates a power from hundredths of a diopter.
    pub fn from_hundredths(hundredths: i32) -> Self {
        Self(hundredths)
    }

    /// Returns the power in hundredths of a diopter.
    pub fn as_hundredths(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for Diopter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { '-' } else { '+' };
        write!(f, "{}{}.{:02}", sign, self.0.abs() / 100, self.0.abs() % 100)
    }
}
