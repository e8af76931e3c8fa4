//! CLI argument definitions for Bridgescope.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `snapshot` | Volumes, rates, liquidity and listed assets for routes |
//! | `ping` | Liveness report (always `ok`) |
//!
//! # Global Options
//!
//! Connection options override the matching `BRIDGESCOPE_*` environment
//! variables.
//!
//! | Option | Env Var | Description |
//! |--------|---------|-------------|
//! | `--base-url` | `BRIDGESCOPE_BASE_URL` | Upstream API base URL |
//! | `--timeout-ms` | `BRIDGESCOPE_TIMEOUT_MS` | Per-call timeout |
//! | `--requests-per-second` | `BRIDGESCOPE_REQUESTS_PER_SECOND` | Outbound rate cap |
//! | `--max-retries` | `BRIDGESCOPE_MAX_RETRIES` | Retry budget per call |
//! | `--pretty` | - | Pretty-print JSON output |
//! | `--log-level` | `RUST_LOG` wins | Default tracing filter |
//!
//! # Examples
//!
//! ```bash
//! bridgescope snapshot \
//!     --route 1:0xa0b8:USDC:6->137:0x3c49:USDC:6 \
//!     --notional 1000000 --notional 250000000 \
//!     --window 24h --window 7d --pretty
//!
//! bridgescope ping
//! ```

use clap::{Args, Parser, Subcommand};

/// Tracing filter used when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_LOG_FILTER: &str = "info,bridgescope_core=debug";

/// Cross-chain bridge data snapshots.
#[derive(Debug, Parser)]
#[command(
    name = "bridgescope",
    author,
    version,
    about = "Cross-chain bridge data snapshots"
)]
pub struct Cli {
    /// Upstream API base URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Per-call timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Outbound request rate cap.
    #[arg(long, global = true)]
    pub requests_per_second: Option<u32>,

    /// Retries per upstream call after the first attempt.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Tracing filter used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = DEFAULT_LOG_FILTER)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assemble a snapshot for one or more routes.
    ///
    /// # Examples
    ///
    ///   bridgescope snapshot --route 1:0xa0b8:USDC:6->137:0x3c49:USDC:6 --notional 1000000
    ///   bridgescope snapshot --route ... --notional ... --window 24h --window 30d --strict
    Snapshot(SnapshotArgs),

    /// Report liveness. Never fails because of the upstream.
    Ping,
}

/// Arguments for the `snapshot` command.
#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Route as `<source>-><destination>`, each asset as
    /// `chainId:assetId:symbol:decimals`.
    #[arg(long = "route", required = true, num_args = 1..)]
    pub routes: Vec<String>,

    /// Input amount in smallest units of each route's source asset.
    #[arg(long = "notional", required = true, num_args = 1..)]
    pub notionals: Vec<String>,

    /// Volume window: 24h, 7d or 30d.
    #[arg(long = "window", num_args = 1.., default_value = "24h")]
    pub windows: Vec<String>,

    /// Slippage thresholds in basis points.
    #[arg(long = "threshold-bps", num_args = 1..)]
    pub thresholds_bps: Vec<u32>,

    /// Fail instead of substituting estimated values.
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Bound on the whole snapshot in milliseconds.
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Use a flat fee of this many basis points when the upstream reports none.
    #[arg(long)]
    pub fee_bps: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_defaults_to_info_with_core_debug() {
        let cli = Cli::try_parse_from(["bridgescope", "ping"]).expect("parses");
        assert_eq!(cli.log_level, "info,bridgescope_core=debug");
        assert!(matches!(cli.command, Command::Ping));
    }

    #[test]
    fn snapshot_flags_parse_with_default_window() {
        let cli = Cli::try_parse_from([
            "bridgescope",
            "--log-level",
            "warn",
            "snapshot",
            "--route",
            "1:0xa0b8:USDC:6->137:0x3c49:USDC:6",
            "--notional",
            "1000000",
            "--strict",
        ])
        .expect("parses");

        assert_eq!(cli.log_level, "warn");
        let Command::Snapshot(args) = cli.command else {
            panic!("expected snapshot command");
        };
        assert_eq!(args.windows, vec![String::from("24h")]);
        assert!(args.strict);
    }
}
