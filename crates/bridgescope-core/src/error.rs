use thiserror::Error;

/// Validation and contract errors exposed by `bridgescope-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("chain id cannot be empty")]
    EmptyChainId,
    #[error("asset id cannot be empty")]
    EmptyAssetId,
    #[error("asset symbol cannot be empty")]
    EmptySymbol,
    #[error("asset decimals must be non-negative: {value}")]
    NegativeDecimals { value: i64 },
    #[error("asset decimals {value} exceed max {max}")]
    DecimalsTooLarge { value: i64, max: u8 },

    #[error("amount cannot be empty")]
    EmptyAmount,
    #[error("amount must be non-negative: '{value}'")]
    NegativeAmount { value: String },
    #[error("amount must be a base-10 integer in smallest units: '{value}'")]
    MalformedAmount { value: String },
    #[error("field '{field}' must be greater than zero")]
    NonPositiveAmount { field: &'static str },

    #[error("division by zero: amountIn must be greater than zero")]
    DivisionByZero,
    #[error("effective rate is too small to represent")]
    RateUnderflow,
    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("invalid volume window '{value}', expected one of 24h, 7d, 30d")]
    InvalidWindow { value: String },
    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("slippage threshold must be a positive number of basis points")]
    InvalidSlippageBps,
    #[error("liquidity probe range is empty: min {min} >= max {max}")]
    EmptyProbeRange { min: u64, max: u64 },

    #[error("snapshot request must include at least one {what}")]
    EmptyRequest { what: &'static str },

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("malformed upstream payload: {reason}")]
    MalformedPayload { reason: String },
}
