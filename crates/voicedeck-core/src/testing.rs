//! In-memory chain client and contribution recorder for tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use voicedeck_contributions::{ContributionError, ContributionInterface};
use voicedeck_delivery::{DeliveryError, DeliveryInterface};
use voicedeck_types::{
	Address, Bytes, ConfigSchema, ContributionRecord, MakerOrder, NetworkConfig, NetworksConfig,
	Schema, Transaction, TransactionHash, TransactionReceipt, ValidationError, B256, U256,
};

pub const CHAIN_ID: u64 = 11155111;

pub fn wallet() -> Address {
	Address::repeat_byte(0x0a)
}

pub fn exchange_address() -> Address {
	Address::repeat_byte(0xe0)
}

pub fn usdc() -> Address {
	Address::repeat_byte(0x1c)
}

pub fn networks() -> NetworksConfig {
	let mut networks = NetworksConfig::new();
	networks.insert(
		CHAIN_ID,
		NetworkConfig {
			rpc_url: "http://localhost:8545".to_string(),
			exchange_address: exchange_address(),
			currencies: vec![],
		},
	);
	networks
}

pub fn order(price: u64) -> MakerOrder {
	MakerOrder {
		id: Some("order-1".to_string()),
		hash: None,
		chain_id: CHAIN_ID,
		quote_type: 1,
		global_nonce: U256::ZERO,
		subset_nonce: U256::ZERO,
		order_nonce: U256::from(1u64),
		strategy_id: U256::from(1u64),
		collection_type: 2,
		collection: Address::repeat_byte(0xc0),
		currency: usdc(),
		signer: Address::repeat_byte(0x5e),
		start_time: 1_714_000_000,
		end_time: 1_745_000_000,
		price: U256::from(price),
		item_ids: vec![U256::from(1u64) << 128],
		amounts: vec![U256::from(1u64)],
		additional_parameters: Bytes::new(),
		signature: Bytes::from(vec![0xab; 65]),
	}
}

struct NoopSchema;

impl ConfigSchema for NoopSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Behavior and call log of [`FakeChain`].
///
/// Submissions are numbered from zero in the order they arrive.
#[derive(Default)]
pub struct ChainState {
	pub allowance: U256,
	pub allowance_error: bool,
	pub fail_submit: HashSet<usize>,
	pub revert: HashSet<usize>,
	pub fail_confirm: HashSet<usize>,
	/// Confirmations that never resolve.
	pub hang_confirm: HashSet<usize>,
	pub submitted: Vec<Transaction>,
	/// `allowance`, `submit:<n>` and `confirm:<n>` entries in call order.
	pub calls: Vec<String>,
}

/// Chain client answering from a shared [`ChainState`].
#[derive(Clone, Default)]
pub struct FakeChain {
	pub state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
	pub fn with_allowance(allowance: u64) -> Self {
		let chain = Self::default();
		chain.state.lock().unwrap().allowance = U256::from(allowance);
		chain
	}

	pub fn submitted(&self) -> Vec<Transaction> {
		self.state.lock().unwrap().submitted.clone()
	}

	pub fn calls(&self) -> Vec<String> {
		self.state.lock().unwrap().calls.clone()
	}
}

fn hash_for(index: usize) -> TransactionHash {
	TransactionHash(B256::with_last_byte(index as u8 + 1))
}

fn index_of(hash: &TransactionHash) -> usize {
	hash.0[31] as usize - 1
}

#[async_trait]
impl DeliveryInterface for FakeChain {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoopSchema)
	}

	fn supported_networks(&self) -> Vec<u64> {
		vec![CHAIN_ID]
	}

	fn sender(&self, chain_id: u64) -> Result<Address, DeliveryError> {
		if chain_id == CHAIN_ID {
			Ok(wallet())
		} else {
			Err(DeliveryError::NoProviderAvailable(chain_id))
		}
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let mut state = self.state.lock().unwrap();
		let index = state.calls.iter().filter(|c| c.starts_with("submit")).count();
		state.calls.push(format!("submit:{}", index));
		if state.fail_submit.contains(&index) {
			return Err(DeliveryError::Network("user rejected the request".to_string()));
		}
		state.submitted.push(tx);
		Ok(hash_for(index))
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		_chain_id: u64,
		_confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		let index = index_of(hash);
		let (hang, result) = {
			let mut state = self.state.lock().unwrap();
			state.calls.push(format!("confirm:{}", index));
			let result = if state.fail_confirm.contains(&index) {
				Err(DeliveryError::Timeout(20))
			} else {
				Ok(TransactionReceipt {
					hash: *hash,
					block_number: 100 + index as u64,
					success: !state.revert.contains(&index),
				})
			};
			(state.hang_confirm.contains(&index), result)
		};
		if hang {
			std::future::pending::<()>().await;
		}
		result
	}

	async fn get_allowance(
		&self,
		_chain_id: u64,
		owner: Address,
		spender: Address,
		_token: Address,
	) -> Result<U256, DeliveryError> {
		let mut state = self.state.lock().unwrap();
		state.calls.push("allowance".to_string());
		assert_eq!(owner, wallet());
		assert_eq!(spender, exchange_address());
		if state.allowance_error {
			return Err(DeliveryError::Network("rpc unavailable".to_string()));
		}
		Ok(state.allowance)
	}
}

/// Contribution recorder keeping records in memory.
#[derive(Clone, Default)]
pub struct FakeRecorder {
	pub records: Arc<Mutex<Vec<ContributionRecord>>>,
	pub reject: bool,
	/// When set, `record` waits for a notification before answering.
	pub gate: Option<Arc<Notify>>,
}

impl FakeRecorder {
	pub fn records(&self) -> Vec<ContributionRecord> {
		self.records.lock().unwrap().clone()
	}
}

#[async_trait]
impl ContributionInterface for FakeRecorder {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoopSchema)
	}

	async fn record(&self, record: &ContributionRecord) -> Result<(), ContributionError> {
		if let Some(gate) = &self.gate {
			gate.notified().await;
		}
		self.records.lock().unwrap().push(record.clone());
		if self.reject {
			return Err(ContributionError::Rejected {
				status: 500,
				body: "database unavailable".to_string(),
			});
		}
		Ok(())
	}
}
