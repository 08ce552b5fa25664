//! Arbitrary-precision token amounts.
//!
//! Token quantities are integers of token base units (e.g. 18-decimal wei)
//! and routinely exceed 64 bits. They travel as base-10 strings and are
//! never converted to floating point.

use bigdecimal::num_bigint::{BigInt, Sign};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A non-negative integer amount of token base units.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(BigInt);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountParseError {
    #[error("invalid token amount: {0:?}")]
    Invalid(String),
    #[error("token amount must not be negative: {0}")]
    Negative(String),
}

impl TokenAmount {
    pub fn zero() -> Self {
        Self(BigInt::default())
    }

    pub fn is_zero(&self) -> bool {
        self.0.sign() == Sign::NoSign
    }

    /// Build an amount from a big integer, rejecting negative values.
    pub fn from_bigint(value: BigInt) -> Result<Self, AmountParseError> {
        if value.sign() == Sign::Minus {
            return Err(AmountParseError::Negative(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn into_bigint(self) -> BigInt {
        self.0
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(BigInt::from(value))
    }
}

impl From<u128> for TokenAmount {
    fn from(value: u128) -> Self {
        Self(BigInt::from(value))
    }
}

impl FromStr for TokenAmount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if trimmed.starts_with('-') {
                return Err(AmountParseError::Negative(trimmed.to_string()));
            }
            return Err(AmountParseError::Invalid(s.to_string()));
        }
        BigInt::from_str(trimmed)
            .map(Self)
            .map_err(|_| AmountParseError::Invalid(s.to_string()))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AmountVisitor;

        impl serde::de::Visitor<'_> for AmountVisitor {
            type Value = TokenAmount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a base-10 integer string or an unsigned integer")
            }

            fn visit_str<E>(self, v: &str) -> Result<TokenAmount, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E>(self, v: u64) -> Result<TokenAmount, E>
            where
                E: serde::de::Error,
            {
                Ok(TokenAmount::from(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<TokenAmount, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(TokenAmount::from)
                    .map_err(|_| E::custom(AmountParseError::Negative(v.to_string())))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
