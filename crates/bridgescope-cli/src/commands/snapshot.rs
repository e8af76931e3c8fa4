use std::sync::Arc;
use std::time::Duration;

use bridgescope_core::{
    Amount, Asset, BridgeDataSource, FeePolicy, Route, Snapshot, SnapshotConfig,
    SnapshotCoordinator, SnapshotStatus, Window,
};
use serde::Serialize;
use serde_json::Value;

use crate::cli::SnapshotArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotOutput {
    status: SnapshotStatus,
    estimated_count: usize,
    snapshot: Snapshot,
}

pub async fn run(args: &SnapshotArgs, source: Arc<dyn BridgeDataSource>) -> Result<Value, CliError> {
    let routes = args
        .routes
        .iter()
        .map(|raw| parse_route(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let notionals = args
        .notionals
        .iter()
        .map(|raw| Amount::parse_positive(raw, "notional"))
        .collect::<Result<Vec<_>, _>>()?;
    let windows = args
        .windows
        .iter()
        .map(|raw| raw.parse::<Window>())
        .collect::<Result<Vec<_>, _>>()?;

    let coordinator = SnapshotCoordinator::new(source, snapshot_config(args));
    let snapshot = coordinator.snapshot(&routes, &notionals, &windows).await?;

    Ok(serde_json::to_value(SnapshotOutput {
        status: snapshot.status(),
        estimated_count: snapshot.estimated_count(),
        snapshot,
    })?)
}

fn snapshot_config(args: &SnapshotArgs) -> SnapshotConfig {
    let mut config = SnapshotConfig::default();
    if args.strict {
        config = config.strict();
    }
    if let Some(deadline_ms) = args.deadline_ms {
        config = config.with_deadline(Duration::from_millis(deadline_ms));
    }
    if let Some(bps) = args.fee_bps {
        config = config.with_fee_policy(FeePolicy::FlatBps(bps));
    }
    if !args.thresholds_bps.is_empty() {
        config.thresholds_bps = args.thresholds_bps.clone();
    }
    config
}

/// `<asset>-><asset>`.
fn parse_route(raw: &str) -> Result<Route, CliError> {
    let (source, destination) = raw
        .split_once("->")
        .ok_or_else(|| CliError::Argument(format!("route '{raw}' must look like <source>-><destination>")))?;
    Ok(Route::new(parse_asset(source)?, parse_asset(destination)?))
}

/// `chainId:assetId:symbol:decimals`.
fn parse_asset(raw: &str) -> Result<Asset, CliError> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    let [chain_id, asset_id, symbol, decimals] = parts.as_slice() else {
        return Err(CliError::Argument(format!(
            "asset '{raw}' must look like chainId:assetId:symbol:decimals"
        )));
    };

    let decimals = decimals
        .trim()
        .parse::<i64>()
        .map_err(|_| CliError::Argument(format!("asset '{raw}' has non-integer decimals")))?;
    Ok(Asset::from_upstream(*chain_id, *asset_id, *symbol, decimals)?)
}
