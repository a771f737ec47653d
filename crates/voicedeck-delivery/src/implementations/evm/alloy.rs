//! Alloy-based chain client for EVM networks.
//!
//! Signs transactions with the service wallet, submits them over HTTP JSON-RPC
//! and polls for receipts. ERC-20 allowances are read with an `eth_call`.

use crate::{DeliveryError, DeliveryInterface};
use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use voicedeck_types::{
	ConfigSchema, Field, FieldType, NetworksConfig, Schema, SecretString, Transaction,
	TransactionHash, TransactionReceipt, ValidationError, U256,
};

sol! {
	interface IERC20 {
		function allowance(address owner, address spender) external view returns (uint256);
	}
}

/// Default delay between receipt polls.
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 5;
/// Budget per required confirmation when no explicit timeout is configured.
const SECONDS_PER_CONFIRMATION: u64 = 20;
const MAX_TIMEOUT_SECONDS: u64 = 3600;

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Alloy-based EVM delivery implementation.
///
/// A single instance serves every chain listed in its `network_ids`, each with
/// its own provider bound to the wallet and chain id.
pub struct AlloyDelivery {
	providers: HashMap<u64, HttpProvider>,
	/// Wallet address, identical on every chain.
	sender: Address,
	poll_interval: Duration,
	/// Fixed confirmation timeout; derived from the confirmation count when unset.
	confirmation_timeout: Option<Duration>,
}

impl AlloyDelivery {
	/// Creates providers for `network_ids` using the RPC endpoints in `networks`.
	pub fn new(
		network_ids: Vec<u64>,
		networks: &NetworksConfig,
		signer: PrivateKeySigner,
	) -> Result<Self, DeliveryError> {
		if network_ids.is_empty() {
			return Err(DeliveryError::Configuration(
				"At least one network_id must be specified".to_string(),
			));
		}

		let mut providers = HashMap::new();
		for network_id in &network_ids {
			let network = networks.get(network_id).ok_or_else(|| {
				DeliveryError::Configuration(format!(
					"Network {} not found in configuration",
					network_id
				))
			})?;

			let url = network.rpc_url.parse().map_err(|e| {
				DeliveryError::Configuration(format!(
					"Invalid RPC URL for network {}: {}",
					network_id, e
				))
			})?;

			let wallet = EthereumWallet::from(signer.clone().with_chain_id(Some(*network_id)));
			let provider = ProviderBuilder::new()
				.with_recommended_fillers()
				.wallet(wallet)
				.on_http(url);

			providers.insert(*network_id, Arc::new(provider) as HttpProvider);
		}

		Ok(Self {
			providers,
			sender: signer.address(),
			poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS),
			confirmation_timeout: None,
		})
	}

	/// Overrides the receipt poll interval.
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	/// Sets a fixed confirmation timeout.
	pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
		self.confirmation_timeout = Some(timeout);
		self
	}

	fn get_provider(&self, chain_id: u64) -> Result<&HttpProvider, DeliveryError> {
		self.providers
			.get(&chain_id)
			.ok_or(DeliveryError::NoProviderAvailable(chain_id))
	}

	fn timeout_for(&self, confirmations: u64) -> Duration {
		self.confirmation_timeout.unwrap_or_else(|| {
			Duration::from_secs(
				confirmations
					.saturating_mul(SECONDS_PER_CONFIRMATION)
					.clamp(SECONDS_PER_CONFIRMATION, MAX_TIMEOUT_SECONDS),
			)
		})
	}
}

fn to_receipt(receipt: &alloy_rpc_types::TransactionReceipt) -> TransactionReceipt {
	TransactionReceipt {
		hash: TransactionHash(receipt.transaction_hash),
		block_number: receipt.block_number.unwrap_or(0),
		success: receipt.status(),
	}
}

/// Configuration schema for the Alloy delivery implementation.
pub struct AlloyDeliverySchema;

impl AlloyDeliverySchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		Self.validate(config)
	}
}

impl ConfigSchema for AlloyDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new(
				"network_ids",
				FieldType::Array(Box::new(FieldType::Integer {
					min: Some(1),
					max: None,
				})),
			)
			.with_validator(|value| match value.as_array() {
				Some(arr) if arr.is_empty() => Err("network_ids cannot be empty".to_string()),
				Some(_) => Ok(()),
				None => Err("network_ids must be an array".to_string()),
			})],
			vec![
				Field::new(
					"poll_interval_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(60),
					},
				),
				Field::new(
					"confirmation_timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(MAX_TIMEOUT_SECONDS as i64),
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyDeliverySchema)
	}

	fn supported_networks(&self) -> Vec<u64> {
		self.providers.keys().copied().collect()
	}

	fn sender(&self, chain_id: u64) -> Result<Address, DeliveryError> {
		self.get_provider(chain_id)?;
		Ok(self.sender)
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let chain_id = tx.chain_id;
		let provider = self.get_provider(chain_id)?;

		let request: TransactionRequest = tx.into();
		let pending_tx = provider
			.send_transaction(request)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send transaction: {}", e)))?;

		let tx_hash = TransactionHash(*pending_tx.tx_hash());
		tracing::info!(tx_hash = %tx_hash, chain_id, "Submitted transaction");

		Ok(tx_hash)
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		chain_id: u64,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		let provider = self.get_provider(chain_id)?;
		let max_wait_time = self.timeout_for(confirmations);
		let start_time = tokio::time::Instant::now();

		tracing::info!(
			tx_hash = %hash,
			chain_id,
			confirmations,
			timeout_secs = max_wait_time.as_secs(),
			"Waiting for confirmation"
		);

		loop {
			if start_time.elapsed() > max_wait_time {
				return Err(DeliveryError::Timeout(max_wait_time.as_secs()));
			}

			let receipt = match provider.get_transaction_receipt(hash.0).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
				Err(e) => {
					return Err(DeliveryError::Network(format!(
						"Failed to get receipt: {}",
						e
					)));
				},
			};

			// Reverted transactions never gain validity with more blocks.
			if !receipt.status() {
				return Ok(to_receipt(&receipt));
			}

			let current_block = provider.get_block_number().await.map_err(|e| {
				DeliveryError::Network(format!("Failed to get block number: {}", e))
			})?;

			let tx_block = receipt.block_number.unwrap_or(current_block);
			// The inclusion block counts as the first confirmation.
			let current_confirmations = current_block.saturating_sub(tx_block) + 1;

			if current_confirmations >= confirmations {
				return Ok(to_receipt(&receipt));
			}

			tracing::debug!(
				remaining = confirmations - current_confirmations,
				"Waiting for more confirmations"
			);
			tokio::time::sleep(self.poll_interval).await;
		}
	}

	async fn get_allowance(
		&self,
		chain_id: u64,
		owner: Address,
		spender: Address,
		token: Address,
	) -> Result<U256, DeliveryError> {
		let provider = self.get_provider(chain_id)?;

		let call_data = IERC20::allowanceCall { owner, spender }.abi_encode();
		let request = TransactionRequest::default()
			.to(token)
			.input(call_data.into());

		let result = provider
			.call(&request)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to call allowance: {}", e)))?;

		let allowance = IERC20::allowanceCall::abi_decode_returns(&result, true)
			.map_err(|e| DeliveryError::Network(format!("Invalid allowance response: {}", e)))?
			._0;

		tracing::debug!(%owner, %spender, %token, %allowance, "Read allowance");
		Ok(allowance)
	}
}

fn read_seconds(config: &toml::Value, key: &str) -> Option<Duration> {
	config
		.get(key)
		.and_then(|v| v.as_integer())
		.map(|secs| Duration::from_secs(secs as u64))
}

/// Factory function to create an HTTP-based delivery provider from configuration.
///
/// # Parameters
/// - `config`: TOML table containing:
///   - `network_ids` (required): chains served by this instance
///   - `poll_interval_seconds` (optional): delay between receipt polls
///   - `confirmation_timeout_seconds` (optional): fixed receipt timeout
/// - `networks`: network configuration with RPC URLs
/// - `private_key`: wallet key signing every transaction
pub fn create_http_delivery(
	config: &toml::Value,
	networks: &NetworksConfig,
	private_key: &SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	AlloyDeliverySchema::validate_config(config)
		.map_err(|e| DeliveryError::Configuration(e.to_string()))?;

	let network_ids = config
		.get("network_ids")
		.and_then(|v| v.as_array())
		.map(|arr| {
			arr.iter()
				.filter_map(|v| v.as_integer().map(|i| i as u64))
				.collect::<Vec<_>>()
		})
		.ok_or_else(|| DeliveryError::Configuration("network_ids is required".to_string()))?;

	let signer: PrivateKeySigner = private_key.with_exposed(|key| {
		key.parse()
			.map_err(|_| DeliveryError::Configuration("Invalid private key format".to_string()))
	})?;

	let mut delivery = AlloyDelivery::new(network_ids, networks, signer)?;
	if let Some(interval) = read_seconds(config, "poll_interval_seconds") {
		delivery = delivery.with_poll_interval(interval);
	}
	if let Some(timeout) = read_seconds(config, "confirmation_timeout_seconds") {
		delivery = delivery.with_confirmation_timeout(timeout);
	}

	Ok(Box::new(delivery))
}

/// Registry for the HTTP/Alloy delivery implementation.
pub struct Registry;

impl voicedeck_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = crate::DeliveryFactory;

	fn factory() -> Self::Factory {
		create_http_delivery
	}
}

impl crate::DeliveryRegistry for Registry {}
