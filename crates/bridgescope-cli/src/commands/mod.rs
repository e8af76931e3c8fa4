mod ping;
mod snapshot;

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use bridgescope_core::{HttpBridgeSource, ProviderConfig};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let config = provider_config(cli)?;
    debug!(?config, "resolved provider config");
    let source = Arc::new(HttpBridgeSource::from_config(config)?);

    match &cli.command {
        Command::Snapshot(args) => snapshot::run(args, source).await,
        Command::Ping => ping::run(source).await,
    }
}

/// Environment first, command-line flags on top.
fn provider_config(cli: &Cli) -> Result<ProviderConfig, CliError> {
    let mut overrides = HashMap::new();
    if let Some(base_url) = &cli.base_url {
        overrides.insert("BRIDGESCOPE_BASE_URL", base_url.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        overrides.insert("BRIDGESCOPE_TIMEOUT_MS", timeout_ms.to_string());
    }
    if let Some(rps) = cli.requests_per_second {
        overrides.insert("BRIDGESCOPE_REQUESTS_PER_SECOND", rps.to_string());
    }
    if let Some(max_retries) = cli.max_retries {
        overrides.insert("BRIDGESCOPE_MAX_RETRIES", max_retries.to_string());
    }

    let config = ProviderConfig::from_lookup(|name| {
        overrides
            .get(name)
            .cloned()
            .or_else(|| env::var(name).ok())
    })?;
    Ok(config)
}
