use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::{format_description, offset};
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::ValidationError;

/// Offset assumed for provider timestamps that carry none.
pub const SHIPPING_OFFSET: UtcOffset = offset!(+8);

/// Instant at which a trace event was reported, kept in [`SHIPPING_OFFSET`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceTime(OffsetDateTime);

impl TraceTime {
    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(SHIPPING_OFFSET))
    }

    /// Parses the timestamp shapes couriers emit: local wall-clock strings,
    /// RFC 3339, or epoch milliseconds rendered as text.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let invalid = || ValidationError::InvalidTimestamp {
            value: input.to_owned(),
        };

        if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
            return Ok(Self::from_offset_datetime(parsed));
        }

        if !trimmed.is_empty() && trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            let millis = trimmed.parse::<i64>().map_err(|_| invalid())?;
            return Self::from_epoch_millis(millis).ok_or_else(invalid);
        }

        let local_formats = [
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
            format_description!("[year]/[month]/[day] [hour]:[minute]:[second]"),
            format_description!("[year]-[month]-[day] [hour]:[minute]"),
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        ];

        local_formats
            .iter()
            .find_map(|format| PrimitiveDateTime::parse(trimmed, format).ok())
            .map(|local| Self(local.assume_offset(SHIPPING_OFFSET)))
            .ok_or_else(invalid)
    }

    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        let nanos = i128::from(millis) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .map(Self::from_offset_datetime)
    }

    /// Reads a JSON field that may hold either a string or epoch milliseconds.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(text) => Self::parse(text).ok(),
            serde_json::Value::Number(number) => {
                number.as_i64().and_then(Self::from_epoch_millis)
            }
            _ => None,
        }
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Calendar day in the shipping offset.
    pub fn date(self) -> Date {
        self.0.date()
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("<unformattable>"))
    }
}

impl Display for TraceTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for TraceTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for TraceTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
