//! Serde module for `U256` values carried as decimal strings.
//!
//! Serialises to a decimal string so JavaScript clients never round the value
//! through a double. Deserialisation also accepts `0x` prefixed hex strings and
//! plain JSON integers, which the marketplace API emits for small fields.

use alloy_primitives::U256;
use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
	Integer(u64),
	Text(String),
}

impl RawNumber {
	fn into_u256<E: Error>(self) -> Result<U256, E> {
		match self {
			RawNumber::Integer(value) => Ok(U256::from(value)),
			RawNumber::Text(text) => parse(&text).map_err(E::custom),
		}
	}
}

fn parse(text: &str) -> Result<U256, String> {
	let text = text.trim();
	let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
		Some(hex) => U256::from_str_radix(hex, 16),
		None => U256::from_str_radix(text, 10),
	};
	parsed.map_err(|e| format!("invalid uint256 '{}': {}", text, e))
}

pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	value.to_string().serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	RawNumber::deserialize(deserializer)?.into_u256()
}

/// Same conversions for `Vec<U256>`.
pub mod vec {
	use super::RawNumber;
	use alloy_primitives::U256;
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		values
			.iter()
			.map(|v| v.to_string())
			.collect::<Vec<_>>()
			.serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<U256>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Vec::<RawNumber>::deserialize(deserializer)?
			.into_iter()
			.map(RawNumber::into_u256)
			.collect()
	}
}

/// `U256` carried as a plain JSON integer, for consumers that read numbers.
///
/// Serialisation fails when the value exceeds `u64`.
pub mod number {
	use super::RawNumber;
	use alloy_primitives::U256;
	use serde::{ser::Error, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let value = u64::try_from(*value)
			.map_err(|_| S::Error::custom(format!("{} does not fit a JSON integer", value)))?;
		serializer.serialize_u64(value)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		RawNumber::deserialize(deserializer)?.into_u256()
	}
}
