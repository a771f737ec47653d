//! Chain client and contribution recorder fakes for the API tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use voicedeck_contributions::{ContributionError, ContributionInterface, ContributionService};
use voicedeck_core::{EventBus, PurchaseOrchestrator};
use voicedeck_delivery::{DeliveryError, DeliveryInterface, DeliveryService};
use voicedeck_exchange::implementations::hypercerts::HypercertExchange;
use voicedeck_exchange::ExchangeService;
use voicedeck_types::{
	Address, ConfigSchema, ContributionRecord, NetworkConfig, NetworksConfig, Schema, Transaction,
	TransactionHash, TransactionReceipt, ValidationError, B256, U256,
};

pub const CHAIN_ID: u64 = 11155111;

pub fn execution_hash() -> TransactionHash {
	TransactionHash(B256::repeat_byte(0x11))
}

struct NoopSchema;

impl ConfigSchema for NoopSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Chain with an unlimited allowance whose confirmations either succeed at
/// once or never arrive.
#[derive(Clone, Default)]
pub struct FakeChain {
	pub settles: bool,
	pub submitted: Arc<Mutex<Vec<Transaction>>>,
}

#[async_trait]
impl DeliveryInterface for FakeChain {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoopSchema)
	}

	fn supported_networks(&self) -> Vec<u64> {
		vec![CHAIN_ID]
	}

	fn sender(&self, _chain_id: u64) -> Result<Address, DeliveryError> {
		Ok(Address::repeat_byte(0x0a))
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		self.submitted.lock().unwrap().push(tx);
		Ok(execution_hash())
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		_chain_id: u64,
		_confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		if !self.settles {
			std::future::pending::<()>().await;
		}
		Ok(TransactionReceipt {
			hash: *hash,
			block_number: 7,
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
		Ok(U256::MAX)
	}
}

/// Recorder accepting every record.
#[derive(Clone, Default)]
pub struct FakeRecorder {
	pub records: Arc<Mutex<Vec<ContributionRecord>>>,
}

#[async_trait]
impl ContributionInterface for FakeRecorder {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoopSchema)
	}

	async fn record(&self, record: &ContributionRecord) -> Result<(), ContributionError> {
		self.records.lock().unwrap().push(record.clone());
		Ok(())
	}
}

pub fn networks() -> NetworksConfig {
	let mut networks = NetworksConfig::new();
	networks.insert(
		CHAIN_ID,
		NetworkConfig {
			rpc_url: "http://localhost:8545".to_string(),
			exchange_address: Address::repeat_byte(0xe0),
			currencies: vec![],
		},
	);
	networks
}

/// Orchestrator backed by `chain`, or by no chain client at all.
pub fn orchestrator(chain: Option<FakeChain>) -> Arc<PurchaseOrchestrator> {
	let implementations: Vec<Box<dyn DeliveryInterface>> = match chain {
		Some(chain) => vec![Box::new(chain)],
		None => vec![],
	};
	Arc::new(PurchaseOrchestrator::new(
		Arc::new(DeliveryService::new(implementations, 1)),
		Arc::new(ExchangeService::new(Box::new(HypercertExchange::new(
			networks(),
			None,
		)))),
		Arc::new(ContributionService::new(Box::new(FakeRecorder::default()))),
		networks(),
		EventBus::new(16),
	))
}

/// Maker order in the marketplace API's JSON shape.
pub fn order_json(chain_id: u64) -> serde_json::Value {
	serde_json::json!({
		"chainId": chain_id,
		"quoteType": 1,
		"globalNonce": "0",
		"subsetNonce": "0",
		"orderNonce": "3",
		"strategyId": "1",
		"collectionType": 2,
		"collection": "0xa16dfb32eb140a6f3f2ac68f41dad8c7e83c4941",
		"currency": "0x1c7d4b196cb0c7b01d743fbc6116a902379c7238",
		"signer": "0x59266d85d94666d037c1e32daa8fac9e95cdafef",
		"startTime": 1714000000u64,
		"endTime": 1745000000u64,
		"price": "1000000000000000",
		"itemIds": ["34028236692093846346337460743176821145600001"],
		"amounts": [1],
		"additionalParameters": "0x",
		"signature": "0x1234"
	})
}
