//! Human-readable order numbers.
//!
//! Format: `EB` + base-36 millisecond timestamp + 4 random base-36 characters,
//! all upper-case (e.g. `EBM3K9ZQ1A7XQ2`). Uniqueness is ultimately enforced by
//! the `orders.order_number` unique index; the random suffix keeps collisions
//! within one millisecond unlikely.

use core::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "EB";
const SUFFIX_LEN: usize = 4;
const MAX_LEN: usize = 50;
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Errors that can occur when parsing an [`OrderNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderNumberError {
    #[error("order number must start with {PREFIX}")]
    MissingPrefix,
    #[error("order number must be at most {MAX_LEN} characters")]
    TooLong,
    #[error("order number is too short")]
    TooShort,
    #[error("order number may only contain 0-9 and A-Z")]
    InvalidCharacter,
}

/// Externally visible order identifier, distinct from the internal key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generate a fresh order number for the current instant.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_at(Utc::now(), &mut rand::rng())
    }

    /// Generate an order number for `now` using `rng` for the suffix.
    #[must_use]
    pub fn generate_at<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        let mut value = String::with_capacity(PREFIX.len() + 9 + SUFFIX_LEN);
        value.push_str(PREFIX);
        value.push_str(&to_base36(millis));
        for _ in 0..SUFFIX_LEN {
            let idx = rng.random_range(0..ALPHABET.len());
            value.push(char::from(ALPHABET.get(idx).copied().unwrap_or(b'0')));
        }
        Self(value)
    }

    /// Parse an order number received from a client or the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the value lacks the prefix, is too short or too
    /// long, or contains characters outside `0-9A-Z`.
    pub fn parse(s: &str) -> Result<Self, OrderNumberError> {
        if s.len() > MAX_LEN {
            return Err(OrderNumberError::TooLong);
        }
        let rest = s.strip_prefix(PREFIX).ok_or(OrderNumberError::MissingPrefix)?;
        if rest.len() <= SUFFIX_LEN {
            return Err(OrderNumberError::TooShort);
        }
        if !rest.bytes().all(|b| ALPHABET.contains(&b)) {
            return Err(OrderNumberError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the order number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while n > 0 {
        // n % 36 < 36, always a valid index
        #[allow(clippy::cast_possible_truncation)]
        let idx = (n % 36) as usize;
        digits.push(ALPHABET.get(idx).copied().unwrap_or(b'0'));
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
