use std::fmt::{Display, Formatter};
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ValidationError;

/// Non-negative integer amount in an asset's smallest unit.
///
/// Carried on the wire as a base-10 digit string so large token amounts never
/// pass through a binary float.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigUint);

impl Amount {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAmount);
        }
        if trimmed.starts_with('-') {
            return Err(ValidationError::NegativeAmount {
                value: trimmed.to_owned(),
            });
        }
        if !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ValidationError::MalformedAmount {
                value: trimmed.to_owned(),
            });
        }

        BigUint::from_str(trimmed)
            .map(Self)
            .map_err(|_| ValidationError::MalformedAmount {
                value: trimmed.to_owned(),
            })
    }

    /// Parses an amount that must be strictly positive.
    pub fn parse_positive(input: &str, field: &'static str) -> Result<Self, ValidationError> {
        let amount = Self::parse(input)?;
        if amount.is_zero() {
            return Err(ValidationError::NonPositiveAmount { field });
        }
        Ok(amount)
    }

    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn from_units(units: BigUint) -> Self {
        Self(units)
    }

    /// Converts a whole-token count into smallest units (`tokens * 10^decimals`).
    pub fn from_whole_tokens(tokens: u64, decimals: u8) -> Self {
        Self(BigUint::from(tokens) * pow10(decimals))
    }

    pub fn units(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

/// `10^exponent` as an arbitrary-precision integer.
pub fn pow10(exponent: u8) -> BigUint {
    BigUint::from(10u32).pow(u32::from(exponent))
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl FromStr for Amount {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_amounts_beyond_u128() {
        let raw = "1000000000000000000000000000000000000000000";
        let amount = Amount::parse(raw).expect("must parse");
        assert_eq!(amount.to_string(), raw);
    }

    #[test]
    fn rejects_negative_and_fractional_amounts() {
        assert!(matches!(
            Amount::parse("-5"),
            Err(ValidationError::NegativeAmount { .. })
        ));
        assert!(matches!(
            Amount::parse("1.5"),
            Err(ValidationError::MalformedAmount { .. })
        ));
        assert_eq!(Amount::parse("  "), Err(ValidationError::EmptyAmount));
    }

    #[test]
    fn positive_parse_rejects_zero() {
        let err = Amount::parse_positive("0", "notional").expect_err("must fail");
        assert_eq!(err, ValidationError::NonPositiveAmount { field: "notional" });
    }

    #[test]
    fn whole_tokens_scale_by_decimals() {
        assert_eq!(Amount::from_whole_tokens(1_500, 6).to_string(), "1500000000");
    }
}
