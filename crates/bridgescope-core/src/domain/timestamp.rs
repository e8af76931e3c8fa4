use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// UTC instant rendered as ISO-8601 with millisecond precision
/// (`2024-01-01T00:00:00.000Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        if parsed.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            });
        }

        Ok(Self(parsed))
    }

    pub fn format_iso8601(self) -> Result<String, time::error::Format> {
        self.0.format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let formatted = self.format_iso8601().map_err(|_| std::fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self
            .format_iso8601()
            .map_err(<S::Error as serde::ser::Error>::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_millisecond_iso8601() {
        let parsed = Timestamp::parse("2024-01-01T00:00:00.5Z").expect("must parse");
        assert_eq!(
            parsed.format_iso8601().expect("formattable"),
            "2024-01-01T00:00:00.500Z"
        );
    }

    #[test]
    fn truncates_to_milliseconds_and_pads_every_field() {
        let parsed = Timestamp::parse("2024-03-07T04:05:06.123987Z").expect("must parse");
        assert_eq!(parsed.to_string(), "2024-03-07T04:05:06.123Z");

        let json = serde_json::to_value(parsed).expect("serializable");
        assert_eq!(json, "2024-03-07T04:05:06.123Z");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let err = Timestamp::parse("2024-01-01T01:00:00+01:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }
}
