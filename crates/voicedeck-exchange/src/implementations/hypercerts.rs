//! Hypercerts exchange client.
//!
//! Encodes calls against the hypercerts marketplace exchange, a LooksRare v2
//! style contract where sellers sign maker asks off chain and buyers execute
//! them with `executeTakerBid`.

use crate::{ExchangeError, ExchangeInterface};
use alloy_primitives::FixedBytes;
use alloy_sol_types::{sol, SolCall, SolValue};
use async_trait::async_trait;
use voicedeck_types::{
	Address, Bytes, ConfigSchema, Field, FieldType, MakerOrder, NetworksConfig, Schema,
	TakerBid, Transaction, ValidationError, U256,
};

sol! {
	/// Maker side of a trade, signed by the seller.
	struct Maker {
		uint8 quoteType;
		uint256 globalNonce;
		uint256 subsetNonce;
		uint256 orderNonce;
		uint256 strategyId;
		uint8 collectionType;
		address collection;
		address currency;
		address signer;
		uint256 startTime;
		uint256 endTime;
		uint256 price;
		uint256[] itemIds;
		uint256[] amounts;
		bytes additionalParameters;
	}

	/// Taker side of a trade.
	struct Taker {
		address recipient;
		bytes additionalParameters;
	}

	struct MerkleTreeNode {
		bytes32 value;
		uint8 position;
	}

	/// Proof for orders signed as part of a merkle tree; empty for single orders.
	struct MerkleTree {
		bytes32 root;
		MerkleTreeNode[] proof;
	}

	interface IHypercertExchange {
		function executeTakerBid(
			Taker takerBid,
			Maker makerAsk,
			bytes makerSignature,
			MerkleTree merkleTree
		) external payable;
	}

	interface IERC20 {
		function approve(address spender, uint256 amount) external returns (bool);
	}
}

/// Quote type of maker asks.
const QUOTE_TYPE_ASK: u8 = 1;

impl From<&MakerOrder> for Maker {
	fn from(order: &MakerOrder) -> Self {
		Maker {
			quoteType: order.quote_type,
			globalNonce: order.global_nonce,
			subsetNonce: order.subset_nonce,
			orderNonce: order.order_nonce,
			strategyId: order.strategy_id,
			collectionType: order.collection_type,
			collection: order.collection,
			currency: order.currency,
			signer: order.signer,
			startTime: U256::from(order.start_time),
			endTime: U256::from(order.end_time),
			price: order.price,
			itemIds: order.item_ids.clone(),
			amounts: order.amounts.clone(),
			additionalParameters: order.additional_parameters.clone(),
		}
	}
}

/// Decodes `(unitAmount, pricePerUnit)` from fractional sale taker parameters.
fn decode_fractional_parameters(parameters: &[u8]) -> Result<(U256, U256), ExchangeError> {
	<(U256, U256)>::abi_decode_params(parameters, true).map_err(|e| {
		ExchangeError::InvalidOrder(format!("Invalid taker parameters: {}", e))
	})
}

/// Hypercerts exchange implementation.
pub struct HypercertExchange {
	networks: NetworksConfig,
	/// Gas limit for order execution; estimated by the provider when unset.
	gas_limit: Option<u64>,
}

impl HypercertExchange {
	pub fn new(networks: NetworksConfig, gas_limit: Option<u64>) -> Self {
		Self {
			networks,
			gas_limit,
		}
	}

	fn exchange_address(&self, chain_id: u64) -> Result<Address, ExchangeError> {
		self.networks
			.get(&chain_id)
			.map(|network| network.exchange_address)
			.ok_or(ExchangeError::UnsupportedNetwork(chain_id))
	}
}

/// Configuration schema for the hypercerts exchange implementation.
pub struct HypercertExchangeSchema;

impl HypercertExchangeSchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		Self.validate(config)
	}
}

impl ConfigSchema for HypercertExchangeSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"gas_limit",
				FieldType::Integer {
					min: Some(21_000),
					max: None,
				},
			)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl ExchangeInterface for HypercertExchange {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HypercertExchangeSchema)
	}

	fn spender(&self, chain_id: u64) -> Result<Address, ExchangeError> {
		self.exchange_address(chain_id)
	}

	fn create_fractional_sale_taker_bid(
		&self,
		order: &MakerOrder,
		recipient: Address,
		unit_amount: U256,
		price_per_unit: U256,
	) -> Result<TakerBid, ExchangeError> {
		if order.quote_type != QUOTE_TYPE_ASK {
			return Err(ExchangeError::InvalidOrder(format!(
				"Expected a maker ask, got quote type {}",
				order.quote_type
			)));
		}
		if unit_amount.is_zero() {
			return Err(ExchangeError::InvalidOrder(
				"Unit amount must be positive".to_string(),
			));
		}

		Ok(TakerBid {
			recipient,
			additional_parameters: (unit_amount, price_per_unit).abi_encode_params().into(),
		})
	}

	async fn approve_erc20(
		&self,
		chain_id: u64,
		currency: Address,
		amount: U256,
	) -> Result<Transaction, ExchangeError> {
		let spender = self.exchange_address(chain_id)?;
		let call_data = IERC20::approveCall { spender, amount }.abi_encode();

		Ok(Transaction {
			chain_id,
			to: Some(currency),
			data: call_data.into(),
			value: U256::ZERO,
			gas_limit: None,
		})
	}

	async fn execute_order(
		&self,
		order: &MakerOrder,
		taker: &TakerBid,
		signature: &Bytes,
	) -> Result<Transaction, ExchangeError> {
		let exchange = self.exchange_address(order.chain_id)?;

		// Native currency orders pay the full price as call value.
		let value = if order.is_native_currency() {
			let (unit_amount, price_per_unit) =
				decode_fractional_parameters(&taker.additional_parameters)?;
			unit_amount.checked_mul(price_per_unit).ok_or_else(|| {
				ExchangeError::InvalidOrder("Total price overflows".to_string())
			})?
		} else {
			U256::ZERO
		};

		let call_data = IHypercertExchange::executeTakerBidCall {
			takerBid: Taker {
				recipient: taker.recipient,
				additionalParameters: taker.additional_parameters.clone(),
			},
			makerAsk: Maker::from(order),
			makerSignature: signature.clone(),
			merkleTree: MerkleTree {
				root: FixedBytes::ZERO,
				proof: vec![],
			},
		}
		.abi_encode();

		tracing::debug!(
			chain_id = order.chain_id,
			%exchange,
			order_nonce = %order.order_nonce,
			"Encoded executeTakerBid"
		);

		Ok(Transaction {
			chain_id: order.chain_id,
			to: Some(exchange),
			data: call_data.into(),
			value,
			gas_limit: self.gas_limit,
		})
	}
}

/// Factory function to create the hypercerts exchange client.
///
/// # Parameters
/// - `config`: TOML table with an optional `gas_limit`
/// - `networks`: network configuration holding each chain's exchange address
pub fn create_exchange(
	config: &toml::Value,
	networks: &NetworksConfig,
) -> Result<Box<dyn ExchangeInterface>, ExchangeError> {
	HypercertExchangeSchema::validate_config(config)
		.map_err(|e| ExchangeError::Configuration(e.to_string()))?;

	let gas_limit = config
		.get("gas_limit")
		.and_then(|v| v.as_integer())
		.map(|limit| limit as u64);

	Ok(Box::new(HypercertExchange::new(networks.clone(), gas_limit)))
}

/// Registry for the hypercerts exchange implementation.
pub struct Registry;

impl voicedeck_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "hypercerts";
	type Factory = crate::ExchangeFactory;

	fn factory() -> Self::Factory {
		create_exchange
	}
}

impl crate::ExchangeRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use voicedeck_types::NetworkConfig;

	const CHAIN_ID: u64 = 11155111;

	fn exchange_address() -> Address {
		"0xB1991E985197d14669852Be8e53ee95A1f4621c0".parse().unwrap()
	}

	fn usdc() -> Address {
		"0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238".parse().unwrap()
	}

	fn exchange() -> HypercertExchange {
		let mut networks = NetworksConfig::new();
		networks.insert(
			CHAIN_ID,
			NetworkConfig {
				rpc_url: "http://localhost:8545".to_string(),
				exchange_address: exchange_address(),
				currencies: vec![],
			},
		);
		HypercertExchange::new(networks, None)
	}

	fn order(currency: Address) -> MakerOrder {
		MakerOrder {
			id: None,
			hash: None,
			chain_id: CHAIN_ID,
			quote_type: QUOTE_TYPE_ASK,
			global_nonce: U256::ZERO,
			subset_nonce: U256::ZERO,
			order_nonce: U256::from(7u64),
			strategy_id: U256::from(1u64),
			collection_type: 2,
			collection: Address::repeat_byte(0xc0),
			currency,
			signer: Address::repeat_byte(0x5e),
			start_time: 1_714_000_000,
			end_time: 1_745_000_000,
			price: U256::from(250u64),
			item_ids: vec![U256::from(1u64) << 128],
			amounts: vec![U256::from(1u64)],
			additional_parameters: Bytes::new(),
			signature: Bytes::from(vec![0xab; 65]),
		}
	}

	#[test]
	fn test_taker_bid_encodes_amount_and_price() {
		let buyer = Address::repeat_byte(0xbb);
		let taker = exchange()
			.create_fractional_sale_taker_bid(
				&order(usdc()),
				buyer,
				U256::from(4u64),
				U256::from(250u64),
			)
			.unwrap();

		assert_eq!(taker.recipient, buyer);
		assert_eq!(taker.additional_parameters.len(), 64);
		assert_eq!(
			decode_fractional_parameters(&taker.additional_parameters).unwrap(),
			(U256::from(4u64), U256::from(250u64))
		);
	}

	#[test]
	fn test_taker_bid_rejects_maker_bid() {
		let mut maker_bid = order(usdc());
		maker_bid.quote_type = 0;

		let result = exchange().create_fractional_sale_taker_bid(
			&maker_bid,
			Address::ZERO,
			U256::from(1u64),
			U256::from(1u64),
		);
		assert!(matches!(result, Err(ExchangeError::InvalidOrder(_))));
	}

	#[tokio::test]
	async fn test_approve_targets_token_with_exchange_as_spender() {
		let tx = exchange()
			.approve_erc20(CHAIN_ID, usdc(), U256::from(1000u64))
			.await
			.unwrap();

		assert_eq!(tx.to, Some(usdc()));
		assert_eq!(tx.value, U256::ZERO);
		let call = IERC20::approveCall::abi_decode(&tx.data, true).unwrap();
		assert_eq!(call.spender, exchange_address());
		assert_eq!(call.amount, U256::from(1000u64));
	}

	#[tokio::test]
	async fn test_execute_order_calldata() {
		let exchange = exchange();
		let order = order(usdc());
		let taker = exchange
			.create_fractional_sale_taker_bid(
				&order,
				Address::repeat_byte(0xbb),
				U256::from(4u64),
				order.price,
			)
			.unwrap();

		let tx = exchange
			.execute_order(&order, &taker, &order.signature)
			.await
			.unwrap();

		assert_eq!(tx.to, Some(exchange_address()));
		assert_eq!(tx.value, U256::ZERO);

		let call = IHypercertExchange::executeTakerBidCall::abi_decode(&tx.data, true).unwrap();
		assert_eq!(call.takerBid.recipient, Address::repeat_byte(0xbb));
		assert_eq!(call.makerAsk.orderNonce, U256::from(7u64));
		assert_eq!(call.makerAsk.itemIds, order.item_ids);
		assert_eq!(call.makerSignature, order.signature);
		assert!(call.merkleTree.proof.is_empty());
	}

	#[tokio::test]
	async fn test_native_currency_attaches_value() {
		let exchange = exchange();
		let order = order(Address::ZERO);
		let taker = exchange
			.create_fractional_sale_taker_bid(
				&order,
				Address::repeat_byte(0xbb),
				U256::from(4u64),
				order.price,
			)
			.unwrap();

		let tx = exchange
			.execute_order(&order, &taker, &order.signature)
			.await
			.unwrap();
		assert_eq!(tx.value, U256::from(1000u64));
	}

	#[tokio::test]
	async fn test_unknown_chain() {
		let exchange = exchange();
		assert!(matches!(
			exchange.spender(1),
			Err(ExchangeError::UnsupportedNetwork(1))
		));
		assert!(exchange
			.approve_erc20(1, usdc(), U256::from(1u64))
			.await
			.is_err());
	}

	#[test]
	fn test_factory_reads_gas_limit() {
		let config: toml::Value = toml::from_str("gas_limit = 500000").unwrap();
		assert!(create_exchange(&config, &NetworksConfig::new()).is_ok());

		let config: toml::Value = toml::from_str("gas_limit = 10").unwrap();
		assert!(matches!(
			create_exchange(&config, &NetworksConfig::new()),
			Err(ExchangeError::Configuration(_))
		));
	}
}
