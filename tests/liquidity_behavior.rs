//! Behavior-driven tests for the liquidity probe.
//!
//! These tests verify HOW the binary search reacts to markets whose slippage
//! grows with size, to failing quotes, and to overlapping candidates between
//! thresholds.

use std::collections::HashSet;
use std::sync::Arc;

use bridgescope_core::{
    pow10, Amount, LiquidityProbe, LiquidityThreshold, ProbeConfig, ProviderError,
    ProviderErrorKind, ValidationError,
};

use bridgescope_tests::{
    flat_spread_quote, linear_slippage_quote, usdc_route, weth_route, ScriptedSource,
};

fn whole_tokens(amount: &Amount, decimals: u8) -> u64 {
    (amount.units() / pow10(decimals))
        .to_string()
        .parse()
        .expect("fits u64")
}

fn threshold(readings: &[LiquidityThreshold], bps: u32) -> &LiquidityThreshold {
    readings
        .iter()
        .find(|reading| reading.slippage_bps == bps)
        .expect("threshold present")
}

// =============================================================================
// Liquidity: Monotonic Markets
// =============================================================================

#[tokio::test]
async fn when_slippage_grows_with_size_the_wider_threshold_allows_more() {
    // Given: A market losing one basis point per 10,000 tokens
    let source = Arc::new(
        ScriptedSource::healthy()
            .with_quotes(|route, amount_in| Ok(linear_slippage_quote(route, amount_in, 10_000))),
    );
    let probe = LiquidityProbe::new(source, ProbeConfig::default());
    let route = usdc_route();

    // When: The canonical thresholds are probed
    let readings = probe.probe(&route, &[50, 100]).await.expect("probe succeeds");

    // Then: Both thresholds are reported, in order
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].slippage_bps, 50);
    assert_eq!(readings[1].slippage_bps, 100);

    // And: The 100bps depth is at least the 50bps depth
    let at_50 = whole_tokens(&threshold(&readings, 50).max_amount_in, 6);
    let at_100 = whole_tokens(&threshold(&readings, 100).max_amount_in, 6);
    assert!(at_100 >= at_50, "100bps={at_100} < 50bps={at_50}");

    // And: Each depth sits just below where slippage crosses the threshold
    assert!((500_000..510_000).contains(&at_50), "50bps depth {at_50}");
    assert!((1_000_000..1_010_000).contains(&at_100), "100bps depth {at_100}");
}

#[tokio::test]
async fn when_assets_have_eighteen_decimals_depth_is_reported_in_smallest_units() {
    // Given: An 18-decimal route on the same linear market
    let source = Arc::new(
        ScriptedSource::healthy()
            .with_quotes(|route, amount_in| Ok(linear_slippage_quote(route, amount_in, 10_000))),
    );
    let probe = LiquidityProbe::new(source, ProbeConfig::default());

    // When: One threshold is probed
    let readings = probe.probe(&weth_route(), &[50]).await.expect("probe succeeds");

    // Then: The amount is whole tokens scaled by 10^18
    let amount = &readings[0].max_amount_in;
    let tokens = whole_tokens(amount, 18);
    assert!((500_000..510_000).contains(&tokens));
    assert_eq!((amount.units() % pow10(18)).to_string(), "0");
}

#[tokio::test]
async fn when_every_size_exceeds_the_threshold_depth_is_zero() {
    // Given: A market with a flat 5% spread
    let source = Arc::new(
        ScriptedSource::healthy()
            .with_quotes(|route, amount_in| Ok(flat_spread_quote(route, amount_in, 500))),
    );
    let probe = LiquidityProbe::new(source, ProbeConfig::default());

    // When: The canonical thresholds are probed
    let readings = probe.probe(&usdc_route(), &[50, 100]).await.expect("probe succeeds");

    // Then: Nothing qualifies
    assert!(readings.iter().all(|reading| reading.max_amount_in.is_zero()));
}

// =============================================================================
// Liquidity: Session Cache
// =============================================================================

#[tokio::test]
async fn when_thresholds_share_candidates_each_amount_is_quoted_once() {
    // Given: A linear market and a counting upstream
    let source = Arc::new(
        ScriptedSource::healthy()
            .with_quotes(|route, amount_in| Ok(linear_slippage_quote(route, amount_in, 10_000))),
    );
    let probe = LiquidityProbe::new(Arc::clone(&source) as _, ProbeConfig::default());

    // When: Both thresholds are probed on one route
    probe.probe(&usdc_route(), &[50, 100]).await.expect("probe succeeds");

    // Then: No amount was quoted twice
    let amounts = source.quoted_amounts();
    let distinct: HashSet<_> = amounts.iter().map(|amount| amount.to_string()).collect();
    assert_eq!(distinct.len(), amounts.len());

    // And: Shared candidates saved calls versus two independent searches
    assert!(source.quote_calls() < 2 * ProbeConfig::default().iterations as usize);
}

// =============================================================================
// Liquidity: Failing Quotes
// =============================================================================

#[tokio::test]
async fn when_large_quotes_fail_they_count_as_exceeding_the_threshold() {
    // Given: An upstream that prices up to 2M tokens and fails above
    let source = Arc::new(ScriptedSource::healthy().with_quotes(|route, amount_in| {
        if amount_in.units() >= &(pow10(6) * 2_000_000u32) {
            Err(ProviderError::transient("insufficient pool depth"))
        } else {
            Ok(flat_spread_quote(route, amount_in, 10))
        }
    }));
    let probe = LiquidityProbe::new(source, ProbeConfig::default());

    // When: The 50bps threshold is probed
    let readings = probe.probe(&usdc_route(), &[50]).await.expect("probe succeeds");

    // Then: The result stays below the failing region
    let tokens = whole_tokens(&readings[0].max_amount_in, 6);
    assert!((1_990_000..2_000_000).contains(&tokens), "depth {tokens}");
}

#[tokio::test]
async fn when_no_quote_succeeds_the_probe_reports_the_failure() {
    // Given: An upstream in a transient outage
    let source = Arc::new(ScriptedSource::outage(ProviderError::transient("down")));
    let probe = LiquidityProbe::new(Arc::clone(&source) as _, ProbeConfig::default());

    // When: The probe runs
    let error = probe
        .probe(&usdc_route(), &[50, 100])
        .await
        .expect_err("nothing was priced");

    // Then: The upstream failure is surfaced for the caller to settle
    assert_eq!(error.kind(), ProviderErrorKind::TransientNetwork);
    assert!(source.quote_calls() > 0);
}

#[tokio::test]
async fn when_credentials_are_rejected_the_probe_stops_immediately() {
    // Given: An upstream rejecting credentials
    let source = Arc::new(ScriptedSource::outage(ProviderError::configuration("401")));
    let probe = LiquidityProbe::new(Arc::clone(&source) as _, ProbeConfig::default());

    // When: The probe runs
    let error = probe
        .probe(&usdc_route(), &[50, 100])
        .await
        .expect_err("credentials rejected");

    // Then: One call was made and the configuration error surfaced
    assert_eq!(error.kind(), ProviderErrorKind::Configuration);
    assert_eq!(source.quote_calls(), 1);
}

#[tokio::test]
async fn when_a_threshold_is_zero_the_probe_is_rejected() {
    // Given: A healthy upstream
    let source = Arc::new(ScriptedSource::healthy());
    let probe = LiquidityProbe::new(Arc::clone(&source) as _, ProbeConfig::default());

    // When: A zero threshold is requested
    let error = probe.probe(&usdc_route(), &[0]).await.expect_err("invalid threshold");

    // Then: Nothing is quoted
    assert_eq!(
        error,
        ProviderError::Validation(ValidationError::InvalidSlippageBps)
    );
    assert_eq!(source.quote_calls(), 0);
}
