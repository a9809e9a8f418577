//! Money types using decimal arithmetic.
//!
//! Catalog prices and order amounts are stored as `NUMERIC(12,2)` and carried
//! around as [`Decimal`]. Conversion to the integer "minor units" a payment
//! processor expects happens only at the gateway boundary via
//! [`Price::to_minor_units`].

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Largest amount a money column holds: `9_999_999_999.99`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Errors from money arithmetic and conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// An amount that must be non-negative was negative.
    #[error("{field} must not be negative (got {value})")]
    Negative {
        /// Which amount was negative.
        field: &'static str,
        /// The offending value.
        value: Decimal,
    },
    /// An amount does not fit the `NUMERIC(12,2)` money columns.
    #[error("{field} {value} exceeds the maximum order amount {max}", max = MAX_AMOUNT)]
    TooLarge {
        /// Which amount was too large.
        field: &'static str,
        /// The offending value.
        value: Decimal,
    },
    /// The discount is larger than subtotal plus shipping.
    #[error("discount {discount} exceeds order value {gross}")]
    DiscountTooLarge {
        /// Requested discount.
        discount: Decimal,
        /// Subtotal plus shipping fee.
        gross: Decimal,
    },
    /// A persisted total disagrees with its components.
    #[error("stored total {stored} does not match computed total {computed}")]
    TotalMismatch {
        /// Value read from storage.
        stored: Decimal,
        /// `subtotal + shipping_fee - discount`.
        computed: Decimal,
    },
    /// Amount has more precision than the currency allows.
    #[error("{amount} cannot be expressed in {currency} minor units")]
    FractionalMinorUnits {
        /// The amount.
        amount: Decimal,
        /// The currency.
        currency: CurrencyCode,
    },
    /// Amount does not fit the processor's integer range.
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
    /// Unknown ISO 4217 code.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    VND,
    USD,
    EUR,
}

impl CurrencyCode {
    /// Number of decimal places in the currency's minor unit.
    ///
    /// VND is a zero-decimal currency: 100000 VND is sent to the processor
    /// as `100000`, whereas 12.50 USD is sent as `1250`.
    #[must_use]
    pub const fn minor_unit_exponent(self) -> u32 {
        match self {
            Self::VND => 0,
            Self::USD | Self::EUR => 2,
        }
    }

    /// Lower-case code as used in payment processor APIs.
    #[must_use]
    pub const fn as_lower_str(self) -> &'static str {
        match self {
            Self::VND => "vnd",
            Self::USD => "usd",
            Self::EUR => "eur",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::VND => "VND",
            Self::USD => "USD",
            Self::EUR => "EUR",
        };
        f.write_str(code)
    }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VND" => Ok(Self::VND),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            other => Err(MoneyError::UnsupportedCurrency(other.to_owned())),
        }
    }
}

/// An amount together with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (dong, dollars - not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Convert to the integer minor units a card processor expects.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::FractionalMinorUnits` when the amount carries more
    /// precision than the currency has (e.g. `0.5` VND), and
    /// `MoneyError::OutOfRange` when it does not fit an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        let scale = Decimal::from(10_i64.pow(self.currency_code.minor_unit_exponent()));
        let scaled = self
            .amount
            .checked_mul(scale)
            .ok_or(MoneyError::OutOfRange(self.amount))?;

        if !scaled.fract().is_zero() {
            return Err(MoneyError::FractionalMinorUnits {
                amount: self.amount,
                currency: self.currency_code,
            });
        }

        scaled.to_i64().ok_or(MoneyError::OutOfRange(self.amount))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount.normalize(), self.currency_code)
    }
}

/// The monetary breakdown of an order.
///
/// Always satisfies `total = subtotal + shipping_fee - discount` with every
/// component non-negative; the only way to build one is [`OrderTotals::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    subtotal: Decimal,
    shipping_fee: Decimal,
    discount: Decimal,
    total: Decimal,
}

impl OrderTotals {
    /// Compute totals from their components.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` if any component is negative,
    /// `MoneyError::DiscountTooLarge` if the discount would push the total
    /// below zero, and `MoneyError::TooLarge` if an amount exceeds
    /// [`MAX_AMOUNT`].
    pub fn new(
        subtotal: Decimal,
        shipping_fee: Decimal,
        discount: Decimal,
    ) -> Result<Self, MoneyError> {
        for (field, value) in [
            ("subtotal", subtotal),
            ("shipping fee", shipping_fee),
            ("discount", discount),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(MoneyError::Negative { field, value });
            }
        }

        let gross = subtotal + shipping_fee;
        if discount > gross {
            return Err(MoneyError::DiscountTooLarge { discount, gross });
        }
        let total = gross - discount;

        for (field, value) in [
            ("subtotal", subtotal),
            ("shipping fee", shipping_fee),
            ("discount", discount),
            ("total", total),
        ] {
            if value > MAX_AMOUNT {
                return Err(MoneyError::TooLarge { field, value });
            }
        }

        Ok(Self {
            subtotal,
            shipping_fee,
            discount,
            total,
        })
    }

    /// Rebuild totals from persisted columns, checking the stored total.
    ///
    /// # Errors
    ///
    /// Same as [`OrderTotals::new`], plus `MoneyError::TotalMismatch` when
    /// `stored_total` disagrees with the recomputed value.
    pub fn from_stored(
        subtotal: Decimal,
        shipping_fee: Decimal,
        discount: Decimal,
        stored_total: Decimal,
    ) -> Result<Self, MoneyError> {
        let totals = Self::new(subtotal, shipping_fee, discount)?;
        if totals.total != stored_total {
            return Err(MoneyError::TotalMismatch {
                stored: stored_total,
                computed: totals.total,
            });
        }
        Ok(totals)
    }

    /// Sum of line prices times quantities.
    #[must_use]
    pub const fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    /// Shipping fee charged on top of the subtotal.
    #[must_use]
    pub const fn shipping_fee(&self) -> Decimal {
        self.shipping_fee
    }

    /// Discount subtracted from the gross amount.
    #[must_use]
    pub const fn discount(&self) -> Decimal {
        self.discount
    }

    /// Amount to charge.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_decimal_currency_minor_units() {
        let price = Price::new(Decimal::new(250_000, 0), CurrencyCode::VND);
        assert_eq!(price.to_minor_units().unwrap(), 250_000);

        // NUMERIC(12,2) columns come back with two decimal places
        let price = Price::new(Decimal::new(25_000_000, 2), CurrencyCode::VND);
        assert_eq!(price.to_minor_units().unwrap(), 250_000);
    }

    #[test]
    fn test_two_decimal_currency_minor_units() {
        let price = Price::new(Decimal::new(1250, 2), CurrencyCode::USD);
        assert_eq!(price.to_minor_units().unwrap(), 1250);
    }

    #[test]
    fn test_fractional_minor_units_rejected() {
        let price = Price::new(Decimal::new(5, 1), CurrencyCode::VND);
        assert!(matches!(
            price.to_minor_units(),
            Err(MoneyError::FractionalMinorUnits { .. })
        ));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("vnd".parse::<CurrencyCode>().unwrap(), CurrencyCode::VND);
        assert_eq!(" USD ".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_totals_invariant() {
        let totals = OrderTotals::new(
            Decimal::new(250_000, 0),
            Decimal::new(30_000, 0),
            Decimal::new(10_000, 0),
        )
        .unwrap();
        assert_eq!(totals.total(), Decimal::new(270_000, 0));
        assert_eq!(
            totals.total(),
            totals.subtotal() + totals.shipping_fee() - totals.discount()
        );
    }

    #[test]
    fn test_totals_reject_negative_and_oversized_discount() {
        assert!(matches!(
            OrderTotals::new(Decimal::new(-1, 0), Decimal::ZERO, Decimal::ZERO),
            Err(MoneyError::Negative { field: "subtotal", .. })
        ));
        assert!(matches!(
            OrderTotals::new(Decimal::new(100, 0), Decimal::ZERO, Decimal::new(101, 0)),
            Err(MoneyError::DiscountTooLarge { .. })
        ));
    }

    #[test]
    fn test_totals_must_fit_money_columns() {
        assert_eq!(MAX_AMOUNT.to_string(), "9999999999.99");
        assert!(OrderTotals::new(MAX_AMOUNT, Decimal::ZERO, Decimal::ZERO).is_ok());

        // 999 copies of a 20M book.
        let subtotal = Decimal::new(20_000_000, 0) * Decimal::from(999);
        assert!(matches!(
            OrderTotals::new(subtotal, Decimal::ZERO, Decimal::ZERO),
            Err(MoneyError::TooLarge { field: "subtotal", .. })
        ));
        assert!(matches!(
            OrderTotals::new(MAX_AMOUNT, Decimal::new(1, 2), Decimal::ZERO),
            Err(MoneyError::TooLarge { field: "total", .. })
        ));
    }
}
