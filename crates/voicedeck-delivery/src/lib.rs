//! Transaction delivery module for the VoiceDeck marketplace.
//!
//! This module is the chain client of the purchase flow. It submits signed
//! transactions, waits for their receipts and reads ERC-20 allowances. A
//! `DeliveryService` routes every call to the implementation serving the
//! target chain.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use voicedeck_types::{
	Address, ConfigSchema, ImplementationRegistry, NetworksConfig, SecretString, Transaction,
	TransactionHash, TransactionReceipt, U256,
};

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The receipt did not reach the required confirmations in time.
	#[error("Timed out after {0} seconds waiting for confirmation")]
	Timeout(u64),
	/// No implementation serves the requested chain.
	#[error("No provider available for chain {0}")]
	NoProviderAvailable(u64),
	/// Invalid implementation configuration.
	#[error("Invalid configuration: {0}")]
	Configuration(String),
}

/// Interface of a chain client implementation.
///
/// One implementation may serve several chains; every call names the chain it
/// targets.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Returns the configuration schema for this delivery implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Chain ids served by this implementation.
	fn supported_networks(&self) -> Vec<u64>;

	/// Address signing transactions on `chain_id`.
	fn sender(&self, chain_id: u64) -> Result<Address, DeliveryError>;

	/// Signs and submits a transaction, returning its hash once accepted by
	/// the node.
	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError>;

	/// Blocks until the transaction is mined with `confirmations` blocks on
	/// top, or the implementation's timeout elapses.
	///
	/// A mined but reverted transaction is returned with `success == false`.
	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		chain_id: u64,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Amount of `token` that `spender` may transfer on behalf of `owner`.
	async fn get_allowance(
		&self,
		chain_id: u64,
		owner: Address,
		spender: Address,
		token: Address,
	) -> Result<U256, DeliveryError>;
}

/// Type alias for delivery factory functions.
///
/// Factories receive their own TOML table, the network configuration and the
/// wallet key.
pub type DeliveryFactory = fn(
	&toml::Value,
	&NetworksConfig,
	&SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

/// Registry trait for delivery implementations.
pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

/// All delivery implementations compiled into this crate.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::evm::alloy;

	vec![(alloy::Registry::NAME, alloy::Registry::factory())]
}

/// Routes chain operations to the implementation serving each chain.
pub struct DeliveryService {
	/// Chain id to the implementation serving it.
	providers: HashMap<u64, Arc<dyn DeliveryInterface>>,
	/// Confirmations required by `confirm`.
	min_confirmations: u64,
}

impl DeliveryService {
	/// Creates a service from implementations, registering each under the
	/// chains it reports in `supported_networks`.
	///
	/// When two implementations claim the same chain the later one wins.
	pub fn new(implementations: Vec<Box<dyn DeliveryInterface>>, min_confirmations: u64) -> Self {
		let mut providers = HashMap::new();
		for implementation in implementations {
			let implementation: Arc<dyn DeliveryInterface> = Arc::from(implementation);
			for chain_id in implementation.supported_networks() {
				providers.insert(chain_id, Arc::clone(&implementation));
			}
		}

		Self {
			providers,
			min_confirmations,
		}
	}

	fn provider(&self, chain_id: u64) -> Result<&Arc<dyn DeliveryInterface>, DeliveryError> {
		self.providers
			.get(&chain_id)
			.ok_or(DeliveryError::NoProviderAvailable(chain_id))
	}

	/// Whether a chain client is registered for `chain_id`.
	pub fn supports(&self, chain_id: u64) -> bool {
		self.providers.contains_key(&chain_id)
	}

	/// Wallet address used on `chain_id`.
	pub fn sender(&self, chain_id: u64) -> Result<Address, DeliveryError> {
		self.provider(chain_id)?.sender(chain_id)
	}

	/// Submits a transaction to the chain named in `tx.chain_id`.
	pub async fn deliver(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		self.provider(tx.chain_id)?.submit(tx).await
	}

	/// Waits for the configured number of confirmations.
	pub async fn confirm(
		&self,
		hash: &TransactionHash,
		chain_id: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.provider(chain_id)?
			.wait_for_confirmation(hash, chain_id, self.min_confirmations)
			.await
	}

	/// ERC-20 allowance of `owner` towards `spender`.
	pub async fn get_allowance(
		&self,
		chain_id: u64,
		owner: Address,
		spender: Address,
		token: Address,
	) -> Result<U256, DeliveryError> {
		self.provider(chain_id)?
			.get_allowance(chain_id, owner, spender, token)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;
	use voicedeck_types::{Bytes, Schema, ValidationError, B256};

	struct NoopSchema;

	impl ConfigSchema for NoopSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	/// Records calls and answers with canned values.
	struct RecordingDelivery {
		chains: Vec<u64>,
		confirmations_seen: Mutex<Vec<u64>>,
	}

	#[async_trait]
	impl DeliveryInterface for RecordingDelivery {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoopSchema)
		}

		fn supported_networks(&self) -> Vec<u64> {
			self.chains.clone()
		}

		fn sender(&self, chain_id: u64) -> Result<Address, DeliveryError> {
			Ok(Address::with_last_byte(chain_id as u8))
		}

		async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
			Ok(TransactionHash(B256::with_last_byte(tx.chain_id as u8)))
		}

		async fn wait_for_confirmation(
			&self,
			hash: &TransactionHash,
			_chain_id: u64,
			confirmations: u64,
		) -> Result<TransactionReceipt, DeliveryError> {
			self.confirmations_seen.lock().unwrap().push(confirmations);
			Ok(TransactionReceipt {
				hash: *hash,
				block_number: 100,
				success: true,
			})
		}

		async fn get_allowance(
			&self,
			_chain_id: u64,
			_owner: Address,
			_spender: Address,
			_token: Address,
		) -> Result<U256, DeliveryError> {
			Ok(U256::from(42u64))
		}
	}

	fn transaction(chain_id: u64) -> Transaction {
		Transaction {
			chain_id,
			to: Some(Address::ZERO),
			data: Bytes::new(),
			value: U256::ZERO,
			gas_limit: None,
		}
	}

	#[tokio::test]
	async fn test_routes_by_chain_id() {
		let service = DeliveryService::new(
			vec![Box::new(RecordingDelivery {
				chains: vec![1, 10],
				confirmations_seen: Mutex::new(vec![]),
			})],
			3,
		);

		assert!(service.supports(10));
		assert!(!service.supports(137));
		assert_eq!(service.sender(10).unwrap(), Address::with_last_byte(10));

		let hash = service.deliver(transaction(10)).await.unwrap();
		assert_eq!(hash, TransactionHash(B256::with_last_byte(10)));
		assert_eq!(
			service
				.get_allowance(1, Address::ZERO, Address::ZERO, Address::ZERO)
				.await
				.unwrap(),
			U256::from(42u64)
		);
	}

	#[tokio::test]
	async fn test_unknown_chain_is_rejected() {
		let service = DeliveryService::new(vec![], 1);

		let result = service.deliver(transaction(137)).await;
		assert!(matches!(result, Err(DeliveryError::NoProviderAvailable(137))));
		assert!(service.sender(137).is_err());
	}

	#[tokio::test]
	async fn test_confirm_uses_configured_confirmations() {
		let delivery = Arc::new(RecordingDelivery {
			chains: vec![1],
			confirmations_seen: Mutex::new(vec![]),
		});

		struct Shared(Arc<RecordingDelivery>);

		#[async_trait]
		impl DeliveryInterface for Shared {
			fn config_schema(&self) -> Box<dyn ConfigSchema> {
				self.0.config_schema()
			}
			fn supported_networks(&self) -> Vec<u64> {
				self.0.supported_networks()
			}
			fn sender(&self, chain_id: u64) -> Result<Address, DeliveryError> {
				self.0.sender(chain_id)
			}
			async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
				self.0.submit(tx).await
			}
			async fn wait_for_confirmation(
				&self,
				hash: &TransactionHash,
				chain_id: u64,
				confirmations: u64,
			) -> Result<TransactionReceipt, DeliveryError> {
				self.0.wait_for_confirmation(hash, chain_id, confirmations).await
			}
			async fn get_allowance(
				&self,
				chain_id: u64,
				owner: Address,
				spender: Address,
				token: Address,
			) -> Result<U256, DeliveryError> {
				self.0.get_allowance(chain_id, owner, spender, token).await
			}
		}

		let service = DeliveryService::new(vec![Box::new(Shared(Arc::clone(&delivery)))], 5);
		let hash = TransactionHash(B256::repeat_byte(0xaa));

		let receipt = service.confirm(&hash, 1).await.unwrap();
		assert_eq!(receipt.hash, hash);
		assert_eq!(*delivery.confirmations_seen.lock().unwrap(), vec![5]);
	}
}
