//! Marketplace client module for the VoiceDeck purchase flow.
//!
//! This module builds the buyer side of a trade on the hypercert exchange:
//! taker bids matched against signed maker asks, ERC-20 approvals towards the
//! exchange and the order execution transaction. Transactions are returned
//! unsigned; submitting them is the chain client's job.

use async_trait::async_trait;
use thiserror::Error;
use voicedeck_types::{
	Address, Bytes, ConfigSchema, ImplementationRegistry, MakerOrder, NetworksConfig, TakerBid,
	Transaction, U256,
};

/// Re-export implementations
pub mod implementations {
	pub mod hypercerts;
}

/// Errors that can occur while building marketplace transactions.
#[derive(Debug, Error)]
pub enum ExchangeError {
	/// The maker order or taker bid cannot be traded.
	#[error("Invalid order: {0}")]
	InvalidOrder(String),
	/// No exchange deployment is configured for the chain.
	#[error("Unsupported network: {0}")]
	UnsupportedNetwork(u64),
	/// Invalid implementation configuration.
	#[error("Invalid configuration: {0}")]
	Configuration(String),
}

/// Trait defining the interface for marketplace clients.
///
/// Implementations know the exchange contract of every supported chain and
/// encode calls against it.
#[async_trait]
pub trait ExchangeInterface: Send + Sync {
	/// Returns the configuration schema for this exchange implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address that must be approved to spend the buyer's tokens on `chain_id`.
	fn spender(&self, chain_id: u64) -> Result<Address, ExchangeError>;

	/// Builds a taker bid buying `unit_amount` units of a fractional sale at
	/// `price_per_unit`, delivered to `recipient`.
	fn create_fractional_sale_taker_bid(
		&self,
		order: &MakerOrder,
		recipient: Address,
		unit_amount: U256,
		price_per_unit: U256,
	) -> Result<TakerBid, ExchangeError>;

	/// Builds an ERC-20 `approve` of `amount` towards the exchange.
	async fn approve_erc20(
		&self,
		chain_id: u64,
		currency: Address,
		amount: U256,
	) -> Result<Transaction, ExchangeError>;

	/// Builds the transaction matching `taker` against the signed maker order.
	async fn execute_order(
		&self,
		order: &MakerOrder,
		taker: &TakerBid,
		signature: &Bytes,
	) -> Result<Transaction, ExchangeError>;
}

/// Type alias for exchange factory functions.
pub type ExchangeFactory =
	fn(&toml::Value, &NetworksConfig) -> Result<Box<dyn ExchangeInterface>, ExchangeError>;

/// Registry trait for exchange implementations.
pub trait ExchangeRegistry: ImplementationRegistry<Factory = ExchangeFactory> {}

/// Get all registered exchange implementations.
pub fn get_all_implementations() -> Vec<(&'static str, ExchangeFactory)> {
	use implementations::hypercerts;

	vec![(hypercerts::Registry::NAME, hypercerts::Registry::factory())]
}

/// Service wrapping the configured marketplace client.
pub struct ExchangeService {
	implementation: Box<dyn ExchangeInterface>,
}

impl ExchangeService {
	/// Creates a new ExchangeService around the primary implementation.
	pub fn new(implementation: Box<dyn ExchangeInterface>) -> Self {
		Self { implementation }
	}

	/// Exchange contract approvals are granted to.
	pub fn spender(&self, chain_id: u64) -> Result<Address, ExchangeError> {
		self.implementation.spender(chain_id)
	}

	/// Builds the taker bid for a fractional purchase.
	pub fn create_fractional_sale_taker_bid(
		&self,
		order: &MakerOrder,
		recipient: Address,
		unit_amount: U256,
		price_per_unit: U256,
	) -> Result<TakerBid, ExchangeError> {
		self.implementation.create_fractional_sale_taker_bid(
			order,
			recipient,
			unit_amount,
			price_per_unit,
		)
	}

	/// Builds an ERC-20 approval towards the exchange.
	pub async fn approve_erc20(
		&self,
		chain_id: u64,
		currency: Address,
		amount: U256,
	) -> Result<Transaction, ExchangeError> {
		self.implementation
			.approve_erc20(chain_id, currency, amount)
			.await
	}

	/// Builds the order execution transaction.
	pub async fn execute_order(
		&self,
		order: &MakerOrder,
		taker: &TakerBid,
		signature: &Bytes,
	) -> Result<Transaction, ExchangeError> {
		self.implementation
			.execute_order(order, taker, signature)
			.await
	}
}
