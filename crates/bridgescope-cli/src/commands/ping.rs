use std::sync::Arc;

use bridgescope_core::{BridgeDataSource, SnapshotConfig, SnapshotCoordinator};
use serde_json::Value;

use crate::error::CliError;

pub async fn run(source: Arc<dyn BridgeDataSource>) -> Result<Value, CliError> {
    let coordinator = SnapshotCoordinator::new(source, SnapshotConfig::default());
    let response = coordinator.ping().await;
    Ok(serde_json::to_value(response)?)
}
