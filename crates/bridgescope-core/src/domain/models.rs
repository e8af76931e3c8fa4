use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Amount, Asset, Route, Timestamp, ValidationError};

/// Where a snapshot value came from.
///
/// Live values serialize without the marker so they match the published
/// wire schema exactly; fallback values add `"provenance": "estimated"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Live,
    Estimated,
}

impl Provenance {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Aggregation window for transfer volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl Window {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }
}

impl Display for Window {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Window {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "24h" => Ok(Self::Day),
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            other => Err(ValidationError::InvalidWindow {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeWindow {
    pub window: Window,
    #[serde(with = "rust_decimal::serde::float")]
    pub volume_usd: Decimal,
    pub measured_at: Timestamp,
    #[serde(default, skip_serializing_if = "Provenance::is_live")]
    pub provenance: Provenance,
}

/// Normalized quote for one route and notional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    pub source: Asset,
    pub destination: Asset,
    pub amount_in: Amount,
    pub amount_out: Amount,
    /// `(amountOut / 10^destDecimals) / (amountIn / 10^sourceDecimals)`.
    #[serde(with = "rust_decimal::serde::float")]
    pub effective_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_fees_usd: Decimal,
    pub quoted_at: Timestamp,
    #[serde(default, skip_serializing_if = "Provenance::is_live")]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityThreshold {
    pub max_amount_in: Amount,
    pub slippage_bps: u32,
}

/// Liquidity depth of one route at each requested slippage threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityReading {
    pub route: Route,
    pub thresholds: Vec<LiquidityThreshold>,
    pub measured_at: Timestamp,
    #[serde(default, skip_serializing_if = "Provenance::is_live")]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedAssets {
    pub assets: Vec<Asset>,
    pub measured_at: Timestamp,
    #[serde(default, skip_serializing_if = "Provenance::is_live")]
    pub provenance: Provenance,
}

impl ListedAssets {
    /// Collapses duplicates by `(chainId, assetId)`, keeping the first seen.
    pub fn collect(
        assets: impl IntoIterator<Item = Asset>,
        measured_at: Timestamp,
        provenance: Provenance,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut output = Vec::new();

        for asset in assets {
            let key = (asset.chain_id.clone(), asset.asset_id.clone());
            if seen.insert(key) {
                output.push(asset);
            }
        }

        Self {
            assets: output,
            measured_at,
            provenance,
        }
    }
}

/// Overall quality of an assembled snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Live,
    Degraded,
}

/// Point-in-time bundle of volume, rate, liquidity and asset data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub volumes: Vec<VolumeWindow>,
    pub rates: Vec<RateQuote>,
    pub liquidity: Vec<LiquidityReading>,
    pub listed_assets: ListedAssets,
}

impl Snapshot {
    pub fn estimated_count(&self) -> usize {
        let volumes = self.volumes.iter().filter(|v| !v.provenance.is_live()).count();
        let rates = self.rates.iter().filter(|r| !r.provenance.is_live()).count();
        let liquidity = self
            .liquidity
            .iter()
            .filter(|l| !l.provenance.is_live())
            .count();
        let assets = usize::from(!self.listed_assets.provenance.is_live());
        volumes + rates + liquidity + assets
    }

    pub fn status(&self) -> SnapshotStatus {
        if self.estimated_count() == 0 {
            SnapshotStatus::Live
        } else {
            SnapshotStatus::Degraded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc(chain: &str, address: &str) -> Asset {
        Asset::new(chain, address, "USDC", 6).expect("valid asset")
    }

    #[test]
    fn parses_windows_case_insensitively() {
        assert_eq!("24H".parse::<Window>(), Ok(Window::Day));
        assert!(matches!(
            "1y".parse::<Window>(),
            Err(ValidationError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn listed_assets_keep_first_seen_duplicate() {
        let first = usdc("1", "0xa0b8");
        let mut renamed = usdc("1", "0xa0b8");
        renamed.symbol = String::from("USDC.e");

        let listed = ListedAssets::collect(
            vec![first.clone(), renamed, usdc("137", "0x3c49")],
            Timestamp::now(),
            Provenance::Live,
        );

        assert_eq!(listed.assets.len(), 2);
        assert_eq!(listed.assets[0], first);
    }

    #[test]
    fn live_values_omit_provenance_marker() {
        let volume = VolumeWindow {
            window: Window::Week,
            volume_usd: Decimal::new(12_345, 1),
            measured_at: Timestamp::parse("2024-01-01T00:00:00Z").expect("valid"),
            provenance: Provenance::Live,
        };
        let json = serde_json::to_value(&volume).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({
                "window": "7d",
                "volumeUsd": 1234.5,
                "measuredAt": "2024-01-01T00:00:00.000Z"
            })
        );

        let estimated = VolumeWindow {
            provenance: Provenance::Estimated,
            ..volume
        };
        let json = serde_json::to_value(&estimated).expect("serializable");
        assert_eq!(json["provenance"], "estimated");
    }
}
