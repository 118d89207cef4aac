//! Chain and transaction type tables reported by the node.
//!
//! Both tables are read once from `getConstants` before any session starts and are shared
//! read-only afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::codec::CodecError;
use crate::utils::json::{i64_flexible, u32_flexible};

/// Label used for a transaction type the node did not describe.
pub const UNKNOWN_TYPE_LABEL: &str = "Unknown";
/// Id of the parent chain, which pays the fees of bundled child chain transactions.
pub const PARENT_CHAIN_ID: u32 = 1;
/// Most decimal places an amount held in an `i64` of minor units can carry.
pub const MAX_DECIMALS: u32 = 18;

/// One sub-ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
	#[serde(deserialize_with = "u32_flexible")]
	pub id: u32,
	pub name: String,
	pub decimals: u32,
}

impl Chain {
	pub fn new(id: u32, name: impl Into<String>, decimals: u32) -> Self {
		Self {
			id,
			name: name.into(),
			decimals,
		}
	}

	/// Minor units in one whole coin, `None` past [`MAX_DECIMALS`].
	pub fn one_coin(&self) -> Option<i64> {
		10i64.checked_pow(self.decimals)
	}
}

/// Protocol constants needed to interpret transactions.
#[derive(Debug, Clone)]
pub struct NodeConstants {
	epoch_beginning: DateTime<Utc>,
	chains: BTreeMap<u32, Chain>,
	transaction_types: HashMap<(i8, i8), String>,
}

impl NodeConstants {
	pub fn new(
		epoch_beginning: DateTime<Utc>,
		chains: impl IntoIterator<Item = Chain>,
		transaction_types: HashMap<(i8, i8), String>,
	) -> Self {
		Self {
			epoch_beginning,
			chains: chains.into_iter().map(|chain| (chain.id, chain)).collect(),
			transaction_types,
		}
	}

	/// Build the tables from a `getConstants` response.
	pub fn from_json(value: &serde_json::Value) -> Result<Self, CodecError> {
		let raw = RawConstants::deserialize(value).map_err(|e| CodecError::Json(e.to_string()))?;

		let epoch_beginning = DateTime::from_timestamp_millis(raw.epoch_beginning).ok_or(
			CodecError::InvalidField {
				field: "epochBeginning",
				reason: raw.epoch_beginning.to_string(),
			},
		)?;

		let mut transaction_types = HashMap::new();
		for (type_key, entry) in raw.transaction_types {
			let tx_type = parse_type_key("transactionTypes", &type_key)?;
			for (subtype_key, subtype) in entry.subtypes {
				let subtype_id = parse_type_key("subtypes", &subtype_key)?;
				transaction_types.insert((tx_type, subtype_id), subtype.name);
			}
		}

		if let Some(chain) = raw
			.chain_properties
			.values()
			.find(|chain| chain.decimals > MAX_DECIMALS)
		{
			return Err(CodecError::InvalidField {
				field: "decimals",
				reason: format!("chain {} has {} decimal places", chain.name, chain.decimals),
			});
		}

		Ok(Self::new(
			epoch_beginning,
			raw.chain_properties.into_values(),
			transaction_types,
		))
	}

	pub fn epoch_beginning(&self) -> DateTime<Utc> {
		self.epoch_beginning
	}

	/// Absolute time of a timestamp expressed in seconds since the ledger epoch.
	pub fn to_time(&self, epoch_seconds: u32) -> DateTime<Utc> {
		self.epoch_beginning + Duration::seconds(epoch_seconds as i64)
	}

	/// Seconds since the ledger epoch, saturating at the epoch itself.
	pub fn to_epoch_seconds(&self, time: DateTime<Utc>) -> u32 {
		let seconds = (time - self.epoch_beginning).num_seconds();
		u32::try_from(seconds.max(0)).unwrap_or(u32::MAX)
	}

	pub fn chain(&self, id: u32) -> Option<&Chain> {
		self.chains.get(&id)
	}

	pub fn chain_by_name(&self, name: &str) -> Option<&Chain> {
		self.chains
			.values()
			.find(|chain| chain.name.eq_ignore_ascii_case(name))
	}

	/// Like [`NodeConstants::chain`] but reporting an unknown id as a codec error.
	pub fn require_chain(&self, id: i64) -> Result<&Chain, CodecError> {
		u32::try_from(id)
			.ok()
			.and_then(|id| self.chain(id))
			.ok_or(CodecError::UnknownChain(id))
	}

	/// All chains ordered by id.
	pub fn chains(&self) -> impl Iterator<Item = &Chain> {
		self.chains.values()
	}

	pub fn type_label(&self, tx_type: i8, subtype: i8) -> &str {
		self.transaction_types
			.get(&(tx_type, subtype))
			.map(String::as_str)
			.unwrap_or(UNKNOWN_TYPE_LABEL)
	}
}

fn parse_type_key(field: &'static str, key: &str) -> Result<i8, CodecError> {
	key.parse().map_err(|_| CodecError::InvalidField {
		field,
		reason: format!("'{}' is not a type number", key),
	})
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConstants {
	#[serde(deserialize_with = "i64_flexible")]
	epoch_beginning: i64,
	chain_properties: HashMap<String, Chain>,
	#[serde(default)]
	transaction_types: HashMap<String, RawTransactionType>,
}

#[derive(Deserialize)]
struct RawTransactionType {
	#[serde(default)]
	subtypes: HashMap<String, RawSubtype>,
}

#[derive(Deserialize)]
struct RawSubtype {
	name: String,
}
