use std::time::Duration;

use bridgescope_core::{ProviderError, SnapshotError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Argument(_) => 2,
            Self::Provider(_) => 3,
            Self::Snapshot(SnapshotError::Validation(_)) => 2,
            Self::Snapshot(SnapshotError::Configuration(_)) => 3,
            Self::Snapshot(SnapshotError::BranchFailed { .. }) => 5,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider(error) => error.retry_after(),
            Self::Snapshot(error) => error.retry_after(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use bridgescope_core::Branch;

    use super::*;

    #[test]
    fn exit_codes_separate_input_upstream_and_degradation() {
        let invalid = CliError::from(ValidationError::EmptyRequest { what: "route" });
        assert_eq!(invalid.exit_code(), 2);

        let unauthorized = CliError::from(SnapshotError::Configuration(
            ProviderError::configuration("invalid api key"),
        ));
        assert_eq!(unauthorized.exit_code(), 3);

        let failed = CliError::from(SnapshotError::BranchFailed {
            branch: Branch::Rates,
            source: ProviderError::transient("timed out"),
        });
        assert_eq!(failed.exit_code(), 5);
    }

    #[test]
    fn rate_limit_hint_survives_wrapping() {
        let error = CliError::from(ProviderError::RateLimited {
            retry_after: Duration::from_secs(42),
            message: String::from("slow down"),
        });
        assert_eq!(error.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(CliError::Argument(String::from("x")).retry_after(), None);
    }
}
