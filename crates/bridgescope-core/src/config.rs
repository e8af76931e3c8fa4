//! Runtime configuration for the upstream connection and snapshot assembly.
//!
//! # Environment Variables
//!
//! | Setting | Primary Env Var | Fallback Env Var | Default |
//! |---------|-----------------|------------------|---------|
//! | Base URL | `BRIDGESCOPE_BASE_URL` | - | (required) |
//! | Per-call timeout | `BRIDGESCOPE_TIMEOUT_MS` | - | `10000` |
//! | Request rate | `BRIDGESCOPE_REQUESTS_PER_SECOND` | - | `10` |
//! | Retry budget | `BRIDGESCOPE_MAX_RETRIES` | - | `3` |
//! | Credential | `BRIDGESCOPE_API_KEY` | `BRIDGE_API_KEY` | none |

use std::env;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::time::Duration;

use crate::liquidity::ProbeConfig;
use crate::normalize::FeePolicy;
use crate::retry::{Backoff, RetryConfig};
use crate::ValidationError;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);
pub const CANONICAL_THRESHOLDS_BPS: [u32; 2] = [50, 100];

/// Connection settings for the bridge-metrics upstream.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub requests_per_second: u32,
    pub max_retries: u32,
    pub credential: Option<String>,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            max_retries: DEFAULT_MAX_RETRIES,
            credential: None,
        }
    }

    /// Reads the process environment. See the module table for names.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("BRIDGESCOPE_BASE_URL").unwrap_or_default();
        let mut config = Self::new(base_url.trim());

        if let Some(value) = lookup("BRIDGESCOPE_TIMEOUT_MS") {
            config.timeout_ms = parse_setting("timeout_ms", &value)?;
        }
        if let Some(value) = lookup("BRIDGESCOPE_REQUESTS_PER_SECOND") {
            config.requests_per_second = parse_setting("requests_per_second", &value)?;
        }
        if let Some(value) = lookup("BRIDGESCOPE_MAX_RETRIES") {
            config.max_retries = parse_setting("max_retries", &value)?;
        }
        config.credential = lookup("BRIDGESCOPE_API_KEY")
            .or_else(|| lookup("BRIDGE_API_KEY"))
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(invalid("base_url", "must be set"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("base_url", "must start with http:// or https://"));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeout_ms", "must be greater than zero"));
        }
        if self.requests_per_second == 0 {
            return Err(invalid("requests_per_second", "must be greater than zero"));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            backoff: Backoff::default(),
            request_timeout: self.timeout(),
        }
    }
}

impl Debug for ProviderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("requests_per_second", &self.requests_per_second)
            .field("max_retries", &self.max_retries)
            .field(
                "credential",
                &self.credential.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// What happens when a snapshot item cannot be fetched live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotMode {
    /// Substitute a conservative value flagged as estimated.
    #[default]
    Resilient,
    /// Fail the whole snapshot.
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotConfig {
    pub mode: SnapshotMode,
    /// Bound on the whole snapshot, across every branch.
    pub deadline: Duration,
    pub thresholds_bps: Vec<u32>,
    pub probe: ProbeConfig,
    pub fee_policy: FeePolicy,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            mode: SnapshotMode::default(),
            deadline: DEFAULT_DEADLINE,
            thresholds_bps: CANONICAL_THRESHOLDS_BPS.to_vec(),
            probe: ProbeConfig::default(),
            fee_policy: FeePolicy::default(),
        }
    }
}

impl SnapshotConfig {
    pub fn strict(mut self) -> Self {
        self.mode = SnapshotMode::Strict;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_fee_policy(mut self, fee_policy: FeePolicy) -> Self {
        self.fee_policy = fee_policy;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.deadline.is_zero() {
            return Err(invalid("deadline", "must be greater than zero"));
        }
        if self.thresholds_bps.is_empty() {
            return Err(invalid("thresholds_bps", "at least one threshold is required"));
        }
        if self.thresholds_bps.contains(&0) {
            return Err(ValidationError::InvalidSlippageBps);
        }
        self.probe.validate()
    }
}

fn parse_setting<T: FromStr>(field: &'static str, value: &str) -> Result<T, ValidationError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| invalid(field, format!("'{value}' is not a valid number")))
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}
