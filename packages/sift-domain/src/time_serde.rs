//! RFC 3339 timestamps as sources send them, stored in UTC.

pub mod option;

use serde::{Deserialize, Deserializer, Serializer, de, ser};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&to_utc_string(*value).map_err(ser::Error::custom)?)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	parse_utc(raw.trim()).map_err(de::Error::custom)
}

fn to_utc_string(value: OffsetDateTime) -> Result<String, String> {
	value
		.to_offset(UtcOffset::UTC)
		.format(&Rfc3339)
		.map_err(|err| format!("timestamp {value} cannot be written as RFC 3339: {err}"))
}

fn parse_utc(raw: &str) -> Result<OffsetDateTime, String> {
	OffsetDateTime::parse(raw, &Rfc3339)
		.map(|ts| ts.to_offset(UtcOffset::UTC))
		.map_err(|err| format!("invalid RFC 3339 timestamp {raw:?}: {err}"))
}
