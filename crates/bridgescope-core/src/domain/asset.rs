use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Largest decimal scale accepted for an asset. Deployed tokens use 18 or
/// fewer.
pub const MAX_DECIMALS: u8 = 36;

/// A token on a specific chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub chain_id: String,
    pub asset_id: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Asset {
    pub fn new(
        chain_id: impl Into<String>,
        asset_id: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Result<Self, ValidationError> {
        let chain_id = chain_id.into().trim().to_owned();
        let asset_id = asset_id.into().trim().to_owned();
        let symbol = symbol.into().trim().to_owned();

        if chain_id.is_empty() {
            return Err(ValidationError::EmptyChainId);
        }
        if asset_id.is_empty() {
            return Err(ValidationError::EmptyAssetId);
        }
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if decimals > MAX_DECIMALS {
            return Err(ValidationError::DecimalsTooLarge {
                value: i64::from(decimals),
                max: MAX_DECIMALS,
            });
        }

        Ok(Self {
            chain_id,
            asset_id,
            symbol,
            decimals,
        })
    }

    /// Builds an asset from an upstream payload where decimals arrive as a
    /// signed integer.
    pub fn from_upstream(
        chain_id: impl Into<String>,
        asset_id: impl Into<String>,
        symbol: impl Into<String>,
        decimals: i64,
    ) -> Result<Self, ValidationError> {
        if decimals < 0 {
            return Err(ValidationError::NegativeDecimals { value: decimals });
        }
        let decimals = u8::try_from(decimals).map_err(|_| ValidationError::DecimalsTooLarge {
            value: decimals,
            max: MAX_DECIMALS,
        })?;
        Self::new(chain_id, asset_id, symbol, decimals)
    }

    /// Identity used for de-duplication: `(chainId, assetId)`.
    pub fn key(&self) -> (&str, &str) {
        (&self.chain_id, &self.asset_id)
    }
}

impl Display for Asset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.chain_id)
    }
}

/// Directed transfer path between two assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub source: Asset,
    pub destination: Asset,
}

impl Route {
    pub fn new(source: Asset, destination: Asset) -> Self {
        Self {
            source,
            destination,
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}
