//! Cart and order line quantities.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative.
    #[error("quantity must be at least {min} (got {value})")]
    TooSmall {
        /// Smallest accepted value.
        min: u16,
        /// The offending value.
        value: i64,
    },
    /// Above the per-line cap.
    #[error("quantity must be at most {max} (got {value})")]
    TooLarge {
        /// Largest accepted value.
        max: u16,
        /// The offending value.
        value: i64,
    },
}

/// Number of units on a cart or order line, always within `1..=999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u16);

impl Quantity {
    /// Smallest quantity a line can hold.
    pub const MIN: u16 = 1;
    /// Largest quantity a single line can hold.
    pub const MAX: u16 = 999;

    /// Validate a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError` if `value` is outside `1..=999`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < i64::from(Self::MIN) {
            return Err(QuantityError::TooSmall {
                min: Self::MIN,
                value,
            });
        }
        if value > i64::from(Self::MAX) {
            return Err(QuantityError::TooLarge {
                max: Self::MAX,
                value,
            });
        }
        // Bounds checked above
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Self(value as u16))
    }

    /// Add `other` to this quantity, respecting the per-line cap.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::TooLarge` if the sum exceeds 999.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        Self::new(i64::from(self.0) + i64::from(other.0))
    }

    /// The raw count.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// The count as the `INTEGER` column type.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        i32::from(self.0)
    }

    /// `unit_price * quantity`.
    #[must_use]
    pub fn times(self, unit_price: Decimal) -> Decimal {
        unit_price * Decimal::from(self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(q: Quantity) -> Self {
        Self::from(q.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
