//! Optional timestamps. Sources send blank strings for unset values, which read as `None`.

use serde::{Deserialize, Deserializer, Serializer, de, ser};
use time::OffsetDateTime;

pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let Some(ts) = value else {
		return serializer.serialize_none();
	};

	serializer.serialize_some(&super::to_utc_string(*ts).map_err(ser::Error::custom)?)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<String>::deserialize(deserializer)? {
		Some(raw) if !raw.trim().is_empty() =>
			super::parse_utc(raw.trim()).map(Some).map_err(de::Error::custom),
		_ => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use serde::Deserialize;
	use time::macros::datetime;

	#[derive(Debug, Deserialize)]
	struct Opened {
		#[serde(default, with = "crate::time_serde::option")]
		at: Option<time::OffsetDateTime>,
	}

	#[test]
	fn blank_and_missing_values_are_unset() {
		let blank: Opened = serde_json::from_str(r#"{"at":"  "}"#).expect("Blank should parse.");
		let null: Opened = serde_json::from_str(r#"{"at":null}"#).expect("Null should parse.");
		let missing: Opened = serde_json::from_str("{}").expect("Missing should parse.");

		assert!(blank.at.is_none());
		assert!(null.at.is_none());
		assert!(missing.at.is_none());
	}

	#[test]
	fn present_values_are_read_in_utc() {
		let opened: Opened =
			serde_json::from_str(r#"{"at":"2026-03-05T00:30:00-01:00"}"#).expect("Should parse.");

		assert_eq!(opened.at, Some(datetime!(2026-03-05 1:30 UTC)));
	}
}
