//! Concurrent snapshot assembly with per-item fallback and one overall deadline.
//!
//! A snapshot fans out into four branches that run concurrently:
//!
//! | Branch | Items |
//! |--------|-------|
//! | volumes | one fetch per requested window |
//! | rates | one quote per (route x notional) |
//! | liquidity | one probe per route, covering every threshold |
//! | listed assets | one global fetch |
//!
//! Every item is bounded by the snapshot deadline. In [`SnapshotMode::Resilient`]
//! a failed or expired item is replaced by a conservative value marked
//! [`Provenance::Estimated`]; in [`SnapshotMode::Strict`] it fails the snapshot.
//! Upstream configuration failures always fail the snapshot.
//!
//! [`SnapshotCoordinator::ping`] never fails. It reports liveness of this
//! process, not of the upstream, and only logs the upstream outcome.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{SnapshotConfig, SnapshotMode};
use crate::data_source::{BridgeDataSource, ProviderError, ProviderErrorKind, PING_TIMEOUT};
use crate::liquidity::LiquidityProbe;
use crate::normalize::{
    estimate_fee, reference_output, to_token_units, DecimalNormalizer, DEFAULT_FEE_BPS,
};
use crate::{
    Amount, LiquidityReading, LiquidityThreshold, ListedAssets, Provenance, RateQuote, Route,
    Snapshot, Timestamp, ValidationError, VolumeWindow, Window,
};

/// Snapshot branch, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Volumes,
    Rates,
    Liquidity,
    ListedAssets,
}

impl Branch {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Volumes => "volumes",
            Self::Rates => "rates",
            Self::Liquidity => "liquidity",
            Self::ListedAssets => "listed_assets",
        }
    }
}

impl Display for Branch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("upstream configuration error: {0}")]
    Configuration(ProviderError),

    /// Only produced in [`SnapshotMode::Strict`].
    #[error("{branch} branch failed: {source}")]
    BranchFailed {
        branch: Branch,
        #[source]
        source: ProviderError,
    },
}

impl SnapshotError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "snapshot.validation",
            Self::Configuration(_) => "snapshot.configuration",
            Self::BranchFailed { .. } => "snapshot.branch_failed",
        }
    }

    /// Upstream back-off hint when the failure was a rate limit.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::BranchFailed { source, .. } => source.retry_after(),
            _ => None,
        }
    }
}

/// Liveness report. `status` is always `"ok"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub timestamp: Timestamp,
}

/// Assembles [`Snapshot`]s from one shared [`BridgeDataSource`].
#[derive(Clone)]
pub struct SnapshotCoordinator {
    source: Arc<dyn BridgeDataSource>,
    normalizer: DecimalNormalizer,
    probe: LiquidityProbe,
    config: SnapshotConfig,
}

impl SnapshotCoordinator {
    pub fn new(source: Arc<dyn BridgeDataSource>, config: SnapshotConfig) -> Self {
        Self {
            normalizer: DecimalNormalizer::new(config.fee_policy),
            probe: LiquidityProbe::new(Arc::clone(&source), config.probe),
            source,
            config,
        }
    }

    /// Builds a snapshot for `routes`, quoting every notional on every route.
    ///
    /// Notionals are amounts in smallest units of each route's source asset.
    pub async fn snapshot(
        &self,
        routes: &[Route],
        notionals: &[Amount],
        windows: &[Window],
    ) -> Result<Snapshot, SnapshotError> {
        self.validate(routes, notionals, windows)?;

        let deadline = Instant::now() + self.config.deadline;
        info!(
            routes = routes.len(),
            notionals = notionals.len(),
            windows = windows.len(),
            mode = ?self.config.mode,
            "assembling snapshot"
        );

        let (volumes, rates, liquidity, listed_assets) = tokio::join!(
            self.volumes(windows, deadline),
            self.rates(routes, notionals, deadline),
            self.liquidity(routes, deadline),
            self.listed_assets(routes, deadline),
        );

        let configuration = [
            volumes.as_ref().err(),
            rates.as_ref().err(),
            liquidity.as_ref().err(),
            listed_assets.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .find(|error| matches!(error, SnapshotError::Configuration(_)))
        .cloned();
        if let Some(error) = configuration {
            return Err(error);
        }

        let snapshot = Snapshot {
            volumes: volumes?,
            rates: rates?,
            liquidity: liquidity?,
            listed_assets: listed_assets?,
        };

        info!(
            status = ?snapshot.status(),
            estimated = snapshot.estimated_count(),
            "snapshot assembled"
        );
        Ok(snapshot)
    }

    /// One lightweight upstream request under [`PING_TIMEOUT`]; always `"ok"`.
    pub async fn ping(&self) -> PingResponse {
        match tokio::time::timeout(PING_TIMEOUT, self.source.ping()).await {
            Ok(Ok(())) => debug!("upstream health probe succeeded"),
            Ok(Err(error)) => warn!(code = error.code(), "upstream health probe failed: {error}"),
            Err(_) => warn!(
                timeout_ms = PING_TIMEOUT.as_millis() as u64,
                "upstream health probe timed out"
            ),
        }

        PingResponse {
            status: "ok",
            timestamp: Timestamp::now(),
        }
    }

    fn validate(
        &self,
        routes: &[Route],
        notionals: &[Amount],
        windows: &[Window],
    ) -> Result<(), ValidationError> {
        self.config.validate()?;
        if routes.is_empty() {
            return Err(ValidationError::EmptyRequest { what: "route" });
        }
        if notionals.is_empty() {
            return Err(ValidationError::EmptyRequest { what: "notional" });
        }
        if windows.is_empty() {
            return Err(ValidationError::EmptyRequest {
                what: "volume window",
            });
        }
        if notionals.iter().any(Amount::is_zero) {
            return Err(ValidationError::NonPositiveAmount { field: "notional" });
        }
        Ok(())
    }

    async fn volumes(
        &self,
        windows: &[Window],
        deadline: Instant,
    ) -> Result<Vec<VolumeWindow>, SnapshotError> {
        let results = join_all(
            windows
                .iter()
                .map(|&window| bounded(deadline, self.source.volume(window))),
        )
        .await;

        let settled = windows
            .iter()
            .zip(results)
            .map(|(&window, result)| {
                let live = result.map(|volume_usd| VolumeWindow {
                    window,
                    volume_usd,
                    measured_at: Timestamp::now(),
                    provenance: Provenance::Live,
                });
                self.settle(Branch::Volumes, live, || VolumeWindow {
                    window,
                    volume_usd: Decimal::ZERO,
                    measured_at: Timestamp::now(),
                    provenance: Provenance::Estimated,
                })
            })
            .collect::<Vec<_>>();

        collect_branch(settled)
    }

    async fn rates(
        &self,
        routes: &[Route],
        notionals: &[Amount],
        deadline: Instant,
    ) -> Result<Vec<RateQuote>, SnapshotError> {
        let pairs: Vec<(&Route, &Amount)> = routes
            .iter()
            .flat_map(|route| notionals.iter().map(move |notional| (route, notional)))
            .collect();

        let results = join_all(
            pairs
                .iter()
                .map(|&(route, notional)| bounded(deadline, self.live_rate(route, notional))),
        )
        .await;

        let settled = pairs
            .iter()
            .zip(results)
            .map(|(&(route, notional), result)| {
                self.settle(Branch::Rates, result, || self.fallback_rate(route, notional))
            })
            .collect::<Vec<_>>();

        collect_branch(settled)
    }

    async fn live_rate(&self, route: &Route, notional: &Amount) -> Result<RateQuote, ProviderError> {
        let quote = self.source.quote(route, notional).await?;
        let rate = self.normalizer.rate_quote(
            route,
            notional.clone(),
            quote.amount_out,
            quote.total_fees_usd,
            Timestamp::now(),
        )?;
        Ok(rate)
    }

    async fn liquidity(
        &self,
        routes: &[Route],
        deadline: Instant,
    ) -> Result<Vec<LiquidityReading>, SnapshotError> {
        let thresholds_bps = self.config.thresholds_bps.as_slice();
        let results = join_all(
            routes
                .iter()
                .map(|route| bounded(deadline, self.probe.probe(route, thresholds_bps))),
        )
        .await;

        let settled = routes
            .iter()
            .zip(results)
            .map(|(route, result)| {
                let live = result.map(|thresholds| LiquidityReading {
                    route: route.clone(),
                    thresholds,
                    measured_at: Timestamp::now(),
                    provenance: Provenance::Live,
                });
                self.settle(Branch::Liquidity, live, || LiquidityReading {
                    route: route.clone(),
                    thresholds: thresholds_bps
                        .iter()
                        .map(|&slippage_bps| LiquidityThreshold {
                            max_amount_in: Amount::zero(),
                            slippage_bps,
                        })
                        .collect(),
                    measured_at: Timestamp::now(),
                    provenance: Provenance::Estimated,
                })
            })
            .collect::<Vec<_>>();

        collect_branch(settled)
    }

    async fn listed_assets(
        &self,
        routes: &[Route],
        deadline: Instant,
    ) -> Result<ListedAssets, SnapshotError> {
        let live = bounded(deadline, self.source.listed_assets())
            .await
            .map(|assets| ListedAssets::collect(assets, Timestamp::now(), Provenance::Live));

        self.settle(Branch::ListedAssets, live, || {
            let route_assets = routes
                .iter()
                .flat_map(|route| [route.source.clone(), route.destination.clone()]);
            ListedAssets::collect(route_assets, Timestamp::now(), Provenance::Estimated)
        })
    }

    /// 1:1 decimal-adjusted output less the default fee haircut.
    fn fallback_rate(&self, route: &Route, notional: &Amount) -> RateQuote {
        let haircut = Decimal::from(DEFAULT_FEE_BPS) / Decimal::from(10_000u32);
        let effective_rate = Decimal::ONE - haircut;
        let total_fees_usd = to_token_units(notional, route.source.decimals)
            .and_then(|normalized_in| {
                estimate_fee(self.normalizer.fee_policy(), normalized_in, effective_rate)
            })
            .unwrap_or(Decimal::ZERO);

        RateQuote {
            source: route.source.clone(),
            destination: route.destination.clone(),
            amount_in: notional.clone(),
            amount_out: reference_output(route, notional, DEFAULT_FEE_BPS),
            effective_rate,
            total_fees_usd,
            quoted_at: Timestamp::now(),
            provenance: Provenance::Estimated,
        }
    }

    fn settle<T>(
        &self,
        branch: Branch,
        result: Result<T, ProviderError>,
        fallback: impl FnOnce() -> T,
    ) -> Result<T, SnapshotError> {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if error.kind() == ProviderErrorKind::Configuration {
            return Err(SnapshotError::Configuration(error));
        }

        match self.config.mode {
            SnapshotMode::Strict => Err(SnapshotError::BranchFailed {
                branch,
                source: error,
            }),
            SnapshotMode::Resilient => {
                warn!(%branch, code = error.code(), "substituting estimated value: {error}");
                Ok(fallback())
            }
        }
    }
}

/// Every item of a branch is settled before this runs, so a configuration
/// failure anywhere in the branch wins over an earlier branch failure.
fn collect_branch<T>(settled: Vec<Result<T, SnapshotError>>) -> Result<Vec<T>, SnapshotError> {
    let configuration = settled.iter().find_map(|item| match item {
        Err(error @ SnapshotError::Configuration(_)) => Some(error.clone()),
        _ => None,
    });

    match configuration {
        Some(error) => Err(error),
        None => settled.into_iter().collect(),
    }
}

async fn bounded<T, F>(deadline: Instant, future: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout_at(deadline, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!("snapshot deadline elapsed before item completed");
            Err(ProviderError::transient("snapshot deadline elapsed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_failures_expose_rate_limit_hint() {
        let error = SnapshotError::BranchFailed {
            branch: Branch::Rates,
            source: ProviderError::RateLimited {
                retry_after: Duration::from_secs(60),
                message: String::from("slow down"),
            },
        };

        assert_eq!(error.code(), "snapshot.branch_failed");
        assert_eq!(error.retry_after(), Some(Duration::from_secs(60)));
        assert!(error.to_string().starts_with("rates branch failed"));
    }

    #[test]
    fn ping_response_serializes_status_and_timestamp() {
        let response = PingResponse {
            status: "ok",
            timestamp: Timestamp::parse("2024-01-01T00:00:00Z").expect("valid"),
        };
        let json = serde_json::to_value(&response).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({"status": "ok", "timestamp": "2024-01-01T00:00:00.000Z"})
        );
    }
}
