//! Timestamp serde helpers.
//!
//! Records arrive from several collectors. Some emit RFC 3339 strings, others
//! epoch milliseconds. Both are accepted on input; output is always RFC 3339.

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{self, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
}

impl RawTimestamp {
    fn into_datetime<E: de::Error>(self) -> Result<OffsetDateTime, E> {
        match self {
            RawTimestamp::Text(s) => OffsetDateTime::parse(s.trim(), &Rfc3339).map_err(E::custom),
            RawTimestamp::Millis(ms) => {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
                    .map_err(E::custom)
            }
        }
    }
}

/// Format a timestamp as RFC 3339. Out-of-range years yield an empty string.
pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

pub fn serialize<S: Serializer>(ts: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
    let text = ts.format(&Rfc3339).map_err(ser::Error::custom)?;
    s.serialize_str(&text)
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OffsetDateTime, D::Error> {
    RawTimestamp::deserialize(d)?.into_datetime()
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &Option<OffsetDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => super::serialize(ts, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        match Option::<RawTimestamp>::deserialize(d)? {
            Some(raw) => raw.into_datetime().map(Some),
            None => Ok(None),
        }
    }
}
