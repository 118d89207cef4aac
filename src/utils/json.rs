//! The node encodes 64-bit values as decimal strings and smaller values as JSON numbers, and is
//! not always consistent about it. These deserializers accept either form.

use serde::{Deserialize, Deserializer, de::Error};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
	Number(T),
	Text(String),
}

fn parse_flexible<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de> + FromStr + Default,
	T::Err: std::fmt::Display,
{
	match NumberOrString::<T>::deserialize(deserializer)? {
		NumberOrString::Number(value) => Ok(value),
		NumberOrString::Text(text) if text.is_empty() => Ok(T::default()),
		NumberOrString::Text(text) => text.parse().map_err(D::Error::custom),
	}
}

pub fn u64_flexible<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
	parse_flexible(deserializer)
}

pub fn i64_flexible<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
	parse_flexible(deserializer)
}

pub fn u32_flexible<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
	parse_flexible(deserializer)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Deserialize)]
	struct Sample {
		#[serde(deserialize_with = "u64_flexible")]
		id: u64,
		#[serde(deserialize_with = "i64_flexible")]
		amount: i64,
	}

	#[test]
	fn test_accepts_numbers_and_strings() {
		let sample: Sample =
			serde_json::from_str(r#"{"id":"18446744073709551615","amount":-5}"#).unwrap();
		assert_eq!(sample.id, u64::MAX);
		assert_eq!(sample.amount, -5);

		let sample: Sample = serde_json::from_str(r#"{"id":7,"amount":"1200"}"#).unwrap();
		assert_eq!(sample.id, 7);
		assert_eq!(sample.amount, 1200);
	}

	#[test]
	fn test_rejects_garbage() {
		assert!(serde_json::from_str::<Sample>(r#"{"id":"x1","amount":0}"#).is_err());
	}
}
