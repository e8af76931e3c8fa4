//! Decimal normalization across assets with different decimal scales.
//!
//! All arithmetic runs on arbitrary-precision integers and is truncated once,
//! at the final conversion to [`Decimal`]. Because `floor(k·n / k·d) ==
//! floor(n / d)`, scaling both amounts by the same factor never changes the
//! resulting rate.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;

use crate::{pow10, Amount, Provenance, RateQuote, Route, Timestamp, ValidationError};

/// Default fee rate used by [`FeePolicy::FlatBps`] and for fallback haircuts.
pub const DEFAULT_FEE_BPS: u32 = 5;

const MAX_SCALE: u32 = 28;
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// How `totalFeesUsd` is filled when the upstream quote carries no fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeePolicy {
    /// `normalizedAmountIn * (1 - effectiveRate)`, clamped at zero. Assumes a
    /// 1:1 reference rate between source and destination.
    #[default]
    Implied,
    /// `normalizedAmountIn * bps / 10000`.
    FlatBps(u32),
}

/// `(amountOut / 10^destDecimals) / (amountIn / 10^sourceDecimals)`.
///
/// Fails with [`ValidationError::DivisionByZero`] when `amount_in` is zero and
/// with [`ValidationError::NonPositiveAmount`] when `amount_out` is zero.
/// Rates below `1e-28`, the finest step [`Decimal`] can hold, fail with
/// [`ValidationError::RateUnderflow`].
pub fn normalize(
    amount_in: &Amount,
    source_decimals: u8,
    amount_out: &Amount,
    dest_decimals: u8,
) -> Result<Decimal, ValidationError> {
    if amount_in.is_zero() {
        return Err(ValidationError::DivisionByZero);
    }
    if amount_out.is_zero() {
        return Err(ValidationError::NonPositiveAmount { field: "amountOut" });
    }

    let numerator = amount_out.units() * pow10(source_decimals);
    let denominator = amount_in.units() * pow10(dest_decimals);
    let rate = ratio(&numerator, &denominator, "effectiveRate")?;

    if rate.is_zero() {
        return Err(ValidationError::RateUnderflow);
    }
    Ok(rate)
}

/// Smallest-unit amount expressed in whole tokens.
pub fn to_token_units(amount: &Amount, decimals: u8) -> Result<Decimal, ValidationError> {
    ratio(amount.units(), &pow10(decimals), "amount")
}

/// Fee in token units according to `policy`.
pub fn estimate_fee(
    policy: FeePolicy,
    normalized_amount_in: Decimal,
    effective_rate: Decimal,
) -> Result<Decimal, ValidationError> {
    let overflow = ValidationError::NonFiniteValue {
        field: "totalFeesUsd",
    };
    let fee = match policy {
        FeePolicy::Implied => {
            let shortfall = (Decimal::ONE - effective_rate).max(Decimal::ZERO);
            normalized_amount_in.checked_mul(shortfall).ok_or(overflow)?
        }
        FeePolicy::FlatBps(bps) => normalized_amount_in
            .checked_mul(Decimal::from(bps))
            .and_then(|value| value.checked_div(Decimal::from(10_000u32)))
            .ok_or(overflow)?,
    };
    Ok(fee.normalize())
}

/// Output the route would yield at a 1:1 rate, less `haircut_bps`.
pub fn reference_output(route: &Route, amount_in: &Amount, haircut_bps: u32) -> Amount {
    let scaled = amount_in.units() * pow10(route.destination.decimals);
    let gross = scaled / pow10(route.source.decimals);
    let haircut = &gross * BigUint::from(haircut_bps.min(10_000)) / BigUint::from(10_000u32);
    Amount::from_units(gross - haircut)
}

/// Turns raw upstream amounts into [`RateQuote`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalNormalizer {
    fee_policy: FeePolicy,
}

impl DecimalNormalizer {
    pub fn new(fee_policy: FeePolicy) -> Self {
        Self { fee_policy }
    }

    pub fn fee_policy(&self) -> FeePolicy {
        self.fee_policy
    }

    /// Builds a quote. `upstream_fee_usd` wins over the fee policy when present.
    pub fn rate_quote(
        &self,
        route: &Route,
        amount_in: Amount,
        amount_out: Amount,
        upstream_fee_usd: Option<Decimal>,
        quoted_at: Timestamp,
    ) -> Result<RateQuote, ValidationError> {
        let effective_rate = normalize(
            &amount_in,
            route.source.decimals,
            &amount_out,
            route.destination.decimals,
        )?;

        let total_fees_usd = match upstream_fee_usd {
            Some(fee) if fee.is_sign_negative() => {
                return Err(ValidationError::NegativeValue {
                    field: "totalFeesUsd",
                })
            }
            Some(fee) => fee,
            None => {
                let normalized_in = to_token_units(&amount_in, route.source.decimals)?;
                estimate_fee(self.fee_policy, normalized_in, effective_rate)?
            }
        };

        Ok(RateQuote {
            source: route.source.clone(),
            destination: route.destination.clone(),
            amount_in,
            amount_out,
            effective_rate,
            total_fees_usd,
            quoted_at,
            provenance: Provenance::Live,
        })
    }
}

fn ratio(
    numerator: &BigUint,
    denominator: &BigUint,
    field: &'static str,
) -> Result<Decimal, ValidationError> {
    if denominator.is_zero() {
        return Err(ValidationError::DivisionByZero);
    }

    let mut scale = MAX_SCALE;
    let mut quotient = numerator * pow10(MAX_SCALE as u8) / denominator;
    let limit = BigUint::from(MAX_MANTISSA);
    while quotient > limit && scale > 0 {
        quotient /= 10u32;
        scale -= 1;
    }

    let mantissa = quotient
        .to_u128()
        .filter(|value| *value <= MAX_MANTISSA)
        .ok_or(ValidationError::NonFiniteValue { field })?;
    let mantissa = i128::try_from(mantissa).map_err(|_| ValidationError::NonFiniteValue { field })?;

    Decimal::try_from_i128_with_scale(mantissa, scale)
        .map(|value| value.normalize())
        .map_err(|_| ValidationError::NonFiniteValue { field })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::Asset;

    fn amount(value: &str) -> Amount {
        Amount::parse(value).expect("valid amount")
    }

    fn usdc_route() -> Route {
        Route::new(
            Asset::new("1", "0xa0b8", "USDC", 6).expect("valid"),
            Asset::new("137", "0x3c49", "USDC", 6).expect("valid"),
        )
    }

    #[test]
    fn usdc_quote_yields_expected_rate_and_implied_fee() {
        let quote = DecimalNormalizer::default()
            .rate_quote(
                &usdc_route(),
                amount("1000000"),
                amount("995000"),
                None,
                Timestamp::now(),
            )
            .expect("quote normalizes");

        assert_eq!(quote.effective_rate, Decimal::from_str("0.995").expect("decimal"));
        assert_eq!(quote.total_fees_usd, Decimal::from_str("0.005").expect("decimal"));
    }

    #[test]
    fn zero_amount_in_is_division_by_zero() {
        let err = normalize(&amount("0"), 6, &amount("1"), 6).expect_err("must fail");
        assert_eq!(err, ValidationError::DivisionByZero);
    }

    #[test]
    fn rates_below_decimal_resolution_underflow() {
        let smallest = normalize(&amount("1000000000000000000000000000"), 0, &amount("1"), 0)
            .expect("1e-27 is representable");
        assert_eq!(smallest, Decimal::from_str("0.000000000000000000000000001").expect("decimal"));

        let err = normalize(&amount("1000000000000000000000000000000"), 0, &amount("1"), 0)
            .expect_err("1e-30 is below resolution");
        assert_eq!(err, ValidationError::RateUnderflow);
    }

    #[test]
    fn rate_is_scale_invariant() {
        let base = normalize(&amount("1234567"), 6, &amount("987654321"), 18).expect("rate");
        for k in [2u64, 7, 1_000, 999_999_937] {
            let scaled_in = Amount::from_units(amount("1234567").units() * BigUint::from(k));
            let scaled_out = Amount::from_units(amount("987654321").units() * BigUint::from(k));
            let scaled = normalize(&scaled_in, 6, &scaled_out, 18).expect("rate");
            assert_eq!(scaled, base, "k={k}");
        }
    }

    #[test]
    fn adjusts_for_differing_decimals() {
        // 1 token of an 18-decimal asset for 2 tokens of a 6-decimal asset.
        let rate = normalize(&amount("1000000000000000000"), 18, &amount("2000000"), 6)
            .expect("rate");
        assert_eq!(rate, Decimal::from(2));
    }

    #[test]
    fn very_large_rates_lose_scale_not_magnitude() {
        let rate = normalize(&amount("1"), 0, &amount("5000000000000000000000000"), 0)
            .expect("rate");
        assert_eq!(rate, Decimal::from_str("5000000000000000000000000").expect("decimal"));
    }

    #[test]
    fn upstream_fee_overrides_policy() {
        let quote = DecimalNormalizer::new(FeePolicy::FlatBps(DEFAULT_FEE_BPS))
            .rate_quote(
                &usdc_route(),
                amount("1000000"),
                amount("995000"),
                Some(Decimal::from_str("0.42").expect("decimal")),
                Timestamp::now(),
            )
            .expect("quote normalizes");
        assert_eq!(quote.total_fees_usd, Decimal::from_str("0.42").expect("decimal"));
    }

    #[test]
    fn flat_fee_policy_uses_bps() {
        let fee = estimate_fee(FeePolicy::FlatBps(5), Decimal::from(1_000), Decimal::ONE)
            .expect("fee");
        assert_eq!(fee, Decimal::from_str("0.5").expect("decimal"));
    }

    #[test]
    fn reference_output_applies_haircut() {
        let out = reference_output(&usdc_route(), &amount("1000000"), DEFAULT_FEE_BPS);
        assert_eq!(out, amount("999500"));
    }
}
