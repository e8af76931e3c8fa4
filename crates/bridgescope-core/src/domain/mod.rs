//! # Domain Models
//!
//! Value types for bridge snapshots. Every type is created per request and
//! dropped once the response is returned.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Asset`] | Token on a chain with its decimal scale |
//! | [`Route`] | Source asset to destination asset |
//! | [`Amount`] | Arbitrary-precision smallest-unit amount |
//! | [`RateQuote`] | Normalized quote with effective rate and fees |
//! | [`LiquidityReading`] | Max input per slippage threshold for a route |
//! | [`VolumeWindow`] | USD volume for a 24h / 7d / 30d window |
//! | [`ListedAssets`] | De-duplicated supported asset list |
//! | [`Snapshot`] | The assembled bundle |
//!
//! Wire names are camelCase. Fallback values carry a `provenance` marker;
//! see [`Provenance`].

mod amount;
mod asset;
mod models;
mod timestamp;

pub use amount::{pow10, Amount};
pub use asset::{Asset, Route, MAX_DECIMALS};
pub use models::{
    LiquidityReading, LiquidityThreshold, ListedAssets, Provenance, RateQuote, Snapshot,
    SnapshotStatus, VolumeWindow, Window,
};
pub use timestamp::Timestamp;
