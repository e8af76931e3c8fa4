//! Bridge-metrics collaborator contract and its error taxonomy.
//!
//! The engine never talks to a specific vendor. It needs four capabilities
//! from whatever sits upstream:
//!
//! | Capability | Method | Result |
//! |------------|--------|--------|
//! | Transfer activity | [`volume`](BridgeDataSource::volume) | USD volume for a window |
//! | Pricing | [`quote`](BridgeDataSource::quote) | Output amount for a route and input |
//! | Asset listing | [`listed_assets`](BridgeDataSource::listed_assets) | Supported assets |
//! | Liveness | [`ping`](BridgeDataSource::ping) | Cheap reachability probe |

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Amount, Asset, Route, ValidationError, Window};

/// Coarse classification used by retry and fallback decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Configuration,
    RateLimited,
    TransientNetwork,
    Http,
    InvalidRequest,
    Validation,
}

/// Tagged upstream failure. Produced at the transport boundary and matched
/// exhaustively by the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Bad or missing credentials. Never retried.
    #[error("upstream rejected credentials: {message}")]
    Configuration { message: String },

    /// Upstream asked us to slow down.
    #[error("upstream rate limited the request (retry after {}s): {message}", .retry_after.as_secs())]
    RateLimited {
        retry_after: Duration,
        message: String,
    },

    /// Timeout, connection failure or 5xx.
    #[error("transient upstream failure: {message}")]
    TransientNetwork {
        status: Option<u16>,
        message: String,
    },

    /// Any other non-2xx status.
    #[error("upstream returned status {status}: {message}")]
    Http { status: u16, message: String },

    /// The transport refused to send the request as built.
    #[error("malformed request: {message}")]
    InvalidRequest { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ProviderError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetwork {
            status: None,
            message: message.into(),
        }
    }

    pub fn malformed_payload(reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::MalformedPayload {
            reason: reason.into(),
        })
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Configuration { .. } => ProviderErrorKind::Configuration,
            Self::RateLimited { .. } => ProviderErrorKind::RateLimited,
            Self::TransientNetwork { .. } => ProviderErrorKind::TransientNetwork,
            Self::Http { .. } => ProviderErrorKind::Http,
            Self::InvalidRequest { .. } => ProviderErrorKind::InvalidRequest,
            Self::Validation(_) => ProviderErrorKind::Validation,
        }
    }

    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind(),
            ProviderErrorKind::RateLimited | ProviderErrorKind::TransientNetwork
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind() {
            ProviderErrorKind::Configuration => "provider.configuration",
            ProviderErrorKind::RateLimited => "provider.rate_limited",
            ProviderErrorKind::TransientNetwork => "provider.transient_network",
            ProviderErrorKind::Http => "provider.http",
            ProviderErrorKind::InvalidRequest => "provider.invalid_request",
            ProviderErrorKind::Validation => "provider.validation",
        }
    }

    /// Hint to surface to callers when the final failure was a rate limit.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Bound on a liveness probe, independent of the configured call timeout.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw quote as returned upstream, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamQuote {
    pub amount_out: Amount,
    /// Fees reported by the upstream, if any.
    pub total_fees_usd: Option<Decimal>,
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Upstream bridge-metrics contract.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// concurrent branch of a snapshot.
pub trait BridgeDataSource: Send + Sync {
    /// USD transfer volume over `window`.
    fn volume<'a>(&'a self, window: Window) -> SourceFuture<'a, Decimal>;

    /// Price `amount_in` (smallest units of the route's source asset).
    fn quote<'a>(&'a self, route: &'a Route, amount_in: &'a Amount)
        -> SourceFuture<'a, UpstreamQuote>;

    /// Every asset the upstream supports, possibly with duplicates.
    fn listed_assets<'a>(&'a self) -> SourceFuture<'a, Vec<Asset>>;

    /// One lightweight request, no retries.
    fn ping<'a>(&'a self) -> SourceFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limits_and_transient_failures_retry() {
        let rate_limited = ProviderError::RateLimited {
            retry_after: Duration::from_secs(60),
            message: String::from("slow down"),
        };
        assert!(rate_limited.retryable());
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

        assert!(ProviderError::transient("timeout").retryable());
        assert!(!ProviderError::configuration("401").retryable());
        assert!(!ProviderError::malformed_payload("missing amountOut").retryable());
        assert!(!ProviderError::Http {
            status: 404,
            message: String::from("not found")
        }
        .retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ProviderError::configuration("401").code(),
            "provider.configuration"
        );
        assert_eq!(
            ProviderError::from(ValidationError::DivisionByZero).code(),
            "provider.validation"
        );
    }
}
