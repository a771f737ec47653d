//! Network configuration types.
//!
//! Each supported chain carries its RPC endpoint, the exchange contract
//! address and the currencies orders may be priced in.

use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A payment currency accepted by the exchange on a network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct CurrencyConfig {
	pub address: Address,
	pub symbol: String,
	pub decimals: u8,
}

/// Configuration for a single blockchain network.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// HTTP(S) JSON-RPC endpoint.
	pub rpc_url: String,
	/// Hypercerts exchange contract; ERC-20 approvals are granted to it.
	pub exchange_address: Address,
	#[serde(default)]
	pub currencies: Vec<CurrencyConfig>,
}

impl NetworkConfig {
	/// Looks up a configured currency by token address.
	pub fn currency(&self, address: &Address) -> Option<&CurrencyConfig> {
		self.currencies.iter().find(|c| &c.address == address)
	}
}

/// Chain id to network configuration.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Deserializes `[networks.<chain_id>]` tables.
///
/// TOML table keys are strings, so chain ids are parsed here.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let by_name: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	let mut networks = HashMap::with_capacity(by_name.len());

	for (key, network) in by_name {
		let chain_id = key
			.parse::<u64>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))?;
		networks.insert(chain_id, network);
	}

	Ok(networks)
}
