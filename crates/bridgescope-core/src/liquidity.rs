//! Liquidity depth discovery by binary search over quoted input sizes.
//!
//! For each slippage threshold the probe searches whole-token amounts in
//! `[min_tokens, max_tokens]` for the largest input whose quote stays within
//! the threshold of the 1:1 decimal-adjusted output. All thresholds of one
//! route share a session cache keyed by probed amount, so overlapping
//! candidates are quoted once.

use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use tracing::{debug, warn};

use crate::data_source::{BridgeDataSource, ProviderError, ProviderErrorKind};
use crate::normalize::reference_output;
use crate::{Amount, LiquidityThreshold, Route, ValidationError};

/// Search range and step budget, in whole tokens of the source asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub min_tokens: u64,
    pub max_tokens: u64,
    pub iterations: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            min_tokens: 1_000,
            max_tokens: 10_000_000,
            iterations: 20,
        }
    }
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.min_tokens >= self.max_tokens {
            return Err(ValidationError::EmptyProbeRange {
                min: self.min_tokens,
                max: self.max_tokens,
            });
        }
        if self.iterations == 0 {
            return Err(ValidationError::InvalidConfig {
                field: "iterations",
                reason: String::from("must be greater than zero"),
            });
        }
        Ok(())
    }
}

/// Finds the maximum tradeable input per slippage threshold.
#[derive(Clone)]
pub struct LiquidityProbe {
    source: Arc<dyn BridgeDataSource>,
    config: ProbeConfig,
}

impl LiquidityProbe {
    pub fn new(source: Arc<dyn BridgeDataSource>, config: ProbeConfig) -> Self {
        Self { source, config }
    }

    /// One reading per threshold, in the order given.
    ///
    /// A failed quote counts as exceeding the threshold. Configuration
    /// failures abort the probe, and so does a session in which no quote
    /// succeeded at all.
    pub async fn probe(
        &self,
        route: &Route,
        thresholds_bps: &[u32],
    ) -> Result<Vec<LiquidityThreshold>, ProviderError> {
        self.config.validate()?;
        if thresholds_bps.is_empty() {
            return Err(ValidationError::EmptyRequest {
                what: "slippage threshold",
            }
            .into());
        }
        if thresholds_bps.contains(&0) {
            return Err(ValidationError::InvalidSlippageBps.into());
        }

        let mut session = ProbeSession::new(self.source.as_ref(), route);
        let mut readings = Vec::with_capacity(thresholds_bps.len());
        for &slippage_bps in thresholds_bps {
            let best = self.search(&mut session, slippage_bps).await?;
            let max_amount_in = match best {
                Some(tokens) => Amount::from_whole_tokens(tokens, route.source.decimals),
                None => Amount::zero(),
            };
            debug!(route = %route, slippage_bps, max_amount_in = %max_amount_in, "liquidity threshold resolved");
            readings.push(LiquidityThreshold {
                max_amount_in,
                slippage_bps,
            });
        }

        if session.successes == 0 {
            if let Some(error) = session.last_error.take() {
                return Err(error);
            }
        }

        debug!(
            route = %route,
            quotes = session.cache.len(),
            lookups = session.lookups,
            "liquidity probe finished"
        );
        Ok(readings)
    }

    async fn search(
        &self,
        session: &mut ProbeSession<'_>,
        slippage_bps: u32,
    ) -> Result<Option<u64>, ProviderError> {
        let mut low = self.config.min_tokens;
        let mut high = self.config.max_tokens;
        let mut best = None;

        for _ in 0..self.config.iterations {
            if high - low <= 1 {
                break;
            }
            let mid = low + (high - low) / 2;
            if session.within(mid, slippage_bps).await? {
                best = Some(mid);
                low = mid;
            } else {
                high = mid;
            }
        }

        Ok(best)
    }
}

/// Per-route probing state. Dropped once the route's readings are built.
struct ProbeSession<'a> {
    source: &'a dyn BridgeDataSource,
    route: &'a Route,
    // amountIn units -> amountOut units, `None` when the quote failed.
    cache: HashMap<BigUint, Option<BigUint>>,
    lookups: usize,
    successes: usize,
    last_error: Option<ProviderError>,
}

impl<'a> ProbeSession<'a> {
    fn new(source: &'a dyn BridgeDataSource, route: &'a Route) -> Self {
        Self {
            source,
            route,
            cache: HashMap::new(),
            lookups: 0,
            successes: 0,
            last_error: None,
        }
    }

    async fn within(&mut self, tokens: u64, slippage_bps: u32) -> Result<bool, ProviderError> {
        let amount_in = Amount::from_whole_tokens(tokens, self.route.source.decimals);
        let Some(actual) = self.quoted_output(&amount_in).await? else {
            return Ok(false);
        };

        let expected = reference_output(self.route, &amount_in, 0);
        Ok(slippage_within(expected.units(), &actual, slippage_bps))
    }

    async fn quoted_output(&mut self, amount_in: &Amount) -> Result<Option<BigUint>, ProviderError> {
        self.lookups += 1;
        if let Some(cached) = self.cache.get(amount_in.units()) {
            return Ok(cached.clone());
        }

        let output = match self.source.quote(self.route, amount_in).await {
            Ok(quote) => {
                self.successes += 1;
                Some(quote.amount_out.units().clone())
            }
            Err(error) if error.kind() == ProviderErrorKind::Configuration => return Err(error),
            Err(error) => {
                warn!(route = %self.route, amount_in = %amount_in, code = error.code(), "probe quote failed, treating as over threshold");
                self.last_error = Some(error);
                None
            }
        };

        self.cache.insert(amount_in.units().clone(), output.clone());
        Ok(output)
    }
}

/// `|expected - actual| / expected * 10000 <= bps`, without division.
fn slippage_within(expected: &BigUint, actual: &BigUint, slippage_bps: u32) -> bool {
    if expected.is_zero() {
        return false;
    }
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    diff * BigUint::from(10_000u32) <= expected * BigUint::from(slippage_bps)
}
