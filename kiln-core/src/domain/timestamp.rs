//! Build timestamps
//!
//! Build completion times are wall-clock local times with second precision,
//! written as `YYYY-MM-DD HH:MM:SS` both in the job mapping and in the build
//! log.

use chrono::{Local, NaiveDateTime, SubsecRound};

/// Text layout used wherever a timestamp is persisted
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Placeholder older job files use for jobs that never ran
pub const NEVER: &str = "Never";

pub type Timestamp = NaiveDateTime;

/// Current local time, truncated to whole seconds so it survives a
/// format/parse round trip unchanged.
pub fn now() -> Timestamp {
    Local::now().naive_local().trunc_subsecs(0)
}

pub fn format(ts: &Timestamp) -> String {
    ts.format(FORMAT).to_string()
}

pub fn parse(s: &str) -> Result<Timestamp, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), FORMAT)
}

/// Serde adapter for a required timestamp field
pub mod required {
    use super::Timestamp;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse(&raw).map_err(D::Error::custom)
    }
}

/// Serde adapter for an optional timestamp field
///
/// `null`, an empty string and the legacy `"Never"` marker all read as `None`.
pub mod optional {
    use super::Timestamp;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        ts: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&super::format(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() || raw.trim() == super::NEVER => Ok(None),
            Some(raw) => super::parse(&raw).map(Some).map_err(D::Error::custom),
        }
    }
}
