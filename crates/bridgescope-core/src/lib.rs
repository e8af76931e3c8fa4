//! # Bridgescope Core
//!
//! Aggregation engine for cross-chain bridge data.
//!
//! ## Overview
//!
//! This crate turns a noisy, rate-limited and sometimes unavailable upstream
//! into normalized point-in-time snapshots:
//!
//! - **Exact decimal normalization** of smallest-unit amounts across assets
//!   with different decimal scales
//! - **Process-wide rate limiting** shared by every outbound call
//! - **Bounded retry** with error classification and exponential backoff
//! - **Liquidity probing** by binary search under a slippage budget
//! - **Concurrent snapshot assembly** with flagged fallbacks and a deadline
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | HTTP implementation of the upstream contract |
//! | [`config`] | Provider and snapshot configuration |
//! | [`data_source`] | Upstream contract and error taxonomy |
//! | [`domain`] | Assets, amounts, quotes, readings, snapshots |
//! | [`error`] | Validation errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`liquidity`] | Binary-search liquidity probe |
//! | [`normalize`] | Rate and fee normalization |
//! | [`retry`] | Retry executor and backoff |
//! | [`snapshot`] | Snapshot coordinator and health probe |
//! | [`throttling`] | Rate limiter |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bridgescope_core::{
//!     Amount, Asset, HttpBridgeSource, ProviderConfig, Route, SnapshotConfig,
//!     SnapshotCoordinator, Window,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HttpBridgeSource::from_config(ProviderConfig::from_env()?)?;
//!     let coordinator = SnapshotCoordinator::new(Arc::new(source), SnapshotConfig::default());
//!
//!     let route = Route::new(
//!         Asset::new("1", "0xa0b8", "USDC", 6)?,
//!         Asset::new("137", "0x3c49", "USDC", 6)?,
//!     );
//!     let snapshot = coordinator
//!         .snapshot(&[route], &[Amount::from(1_000_000)], &[Window::Day])
//!         .await?;
//!
//!     println!("{:?}: {} estimated values", snapshot.status(), snapshot.estimated_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ SnapshotCoordinator  │──────────────┐
//! └──────────┬───────────┘              │
//!            │                          ▼
//!            │                 ┌──────────────────┐
//!            │                 │ LiquidityProbe   │
//!            │                 └────────┬─────────┘
//!            ▼                          │
//! ┌──────────────────────┐              │      ┌──────────────────┐
//! │ BridgeDataSource     │◀─────────────┘      │ DecimalNormalizer│
//! │ (HttpBridgeSource)   │                     └──────────────────┘
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────┐
//! │ RetryExecutor        │────▶│ RateLimiter      │
//! └──────────┬───────────┘     └──────────────────┘
//!            ▼
//! ┌──────────────────────┐
//! │ HttpClient (reqwest) │
//! └──────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Upstream failures are a closed set of tagged variants, classified once at
//! the transport boundary:
//!
//! ```rust
//! use bridgescope_core::{ProviderError, ProviderErrorKind};
//!
//! fn handle_error(error: &ProviderError) {
//!     match error.kind() {
//!         ProviderErrorKind::Configuration => {
//!             // Fix credentials; never retried
//!         }
//!         ProviderErrorKind::RateLimited => {
//!             let _hint = error.retry_after();
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - The credential is read from the environment and never logged
//! - All HTTP requests use TLS via rustls

pub mod adapters;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod liquidity;
pub mod normalize;
pub mod retry;
pub mod snapshot;
pub mod throttling;

// Re-export commonly used types at crate root for convenience

// Adapter implementations
pub use adapters::HttpBridgeSource;

// Configuration
pub use config::{ProviderConfig, SnapshotConfig, SnapshotMode};

// Upstream contract
pub use data_source::{
    BridgeDataSource, ProviderError, ProviderErrorKind, SourceFuture, UpstreamQuote, PING_TIMEOUT,
};

// Domain models
pub use domain::{
    pow10, Amount, Asset, LiquidityReading, LiquidityThreshold, ListedAssets, Provenance,
    RateQuote, Route, Snapshot, SnapshotStatus, Timestamp, VolumeWindow, Window, MAX_DECIMALS,
};

// Error types
pub use error::ValidationError;

// HTTP client
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpMethod, HttpRequest,
    HttpResponse, NoopHttpClient, ReqwestHttpClient,
};

// Components
pub use liquidity::{LiquidityProbe, ProbeConfig};
pub use normalize::{DecimalNormalizer, FeePolicy};
pub use retry::{Backoff, RetryConfig, RetryExecutor};
pub use snapshot::{Branch, PingResponse, SnapshotCoordinator, SnapshotError};
pub use throttling::RateLimiter;
