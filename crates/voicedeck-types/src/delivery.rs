//! Transaction delivery types.
//!
//! This module defines the chain-facing types exchanged between the
//! marketplace client, the chain client and the purchase orchestrator.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rpc_types::TransactionRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte identifier of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub B256);

impl TransactionHash {
	/// Lowercase hex form with `0x` prefix.
	pub fn to_hex(&self) -> String {
		format!("{:#x}", self.0)
	}
}

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:#x}", self.0)
	}
}

impl From<B256> for TransactionHash {
	fn from(hash: B256) -> Self {
		Self(hash)
	}
}

/// Transaction receipt containing execution details.
///
/// Provides information about a transaction after it has been included in a block,
/// including its success status and block number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
}

/// Unsigned transaction produced by the marketplace client.
///
/// Signing and nonce/fee filling are left to the chain client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	/// Chain the transaction targets.
	pub chain_id: u64,
	/// Recipient contract, `None` for contract creation.
	pub to: Option<Address>,
	/// ABI encoded calldata.
	pub data: Bytes,
	/// Native value attached to the call.
	pub value: U256,
	/// Explicit gas limit; estimated by the provider when absent.
	pub gas_limit: Option<u64>,
}

impl From<Transaction> for TransactionRequest {
	fn from(tx: Transaction) -> Self {
		let mut request = TransactionRequest::default()
			.input(tx.data.into())
			.value(tx.value);
		request.chain_id = Some(tx.chain_id);
		if let Some(to) = tx.to {
			request = request.to(to);
		}
		if let Some(gas_limit) = tx.gas_limit {
			request = request.gas_limit(gas_limit);
		}
		request
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, b256};

	#[test]
	fn test_hash_display_is_prefixed_hex() {
		let hash = TransactionHash(b256!(
			"00000000000000000000000000000000000000000000000000000000000000ab"
		));
		assert_eq!(
			hash.to_string(),
			"0x00000000000000000000000000000000000000000000000000000000000000ab"
		);
		assert_eq!(hash.to_hex(), hash.to_string());
	}

	#[test]
	fn test_transaction_into_request() {
		let tx = Transaction {
			chain_id: 10,
			to: Some(address!("5FbDB2315678afecb367f032d93F642f64180aa3")),
			data: Bytes::from(vec![0x09, 0x5e, 0xa7, 0xb3]),
			value: U256::from(7u64),
			gas_limit: Some(100_000),
		};

		let request: TransactionRequest = tx.clone().into();
		assert_eq!(request.chain_id, Some(10));
		assert_eq!(request.value, Some(U256::from(7u64)));
		assert_eq!(request.gas, Some(100_000));
		assert_eq!(request.input.input().cloned(), Some(tx.data));
	}
}
