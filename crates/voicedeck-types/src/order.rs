//! Marketplace order types.
//!
//! A `MakerOrder` is a signed sell offer published by a hypercert owner on the
//! exchange. Buying from it requires a `TakerBid` built from the buyer's
//! address, the unit amount and the unit price.

use crate::utils::u256_serde;
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Signed maker order as served by the marketplace API.
///
/// Field names follow the exchange's `Maker` struct. Big integers are carried
/// as decimal strings in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakerOrder {
	/// Marketplace API identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// EIP-712 hash of the order, as reported by the marketplace API.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hash: Option<String>,
	/// Chain the exchange contract lives on.
	pub chain_id: u64,
	/// 0 for bids, 1 for asks.
	pub quote_type: u8,
	#[serde(with = "u256_serde")]
	pub global_nonce: U256,
	#[serde(with = "u256_serde")]
	pub subset_nonce: U256,
	#[serde(with = "u256_serde")]
	pub order_nonce: U256,
	/// Exchange strategy, e.g. the fractional sale strategy.
	#[serde(with = "u256_serde")]
	pub strategy_id: U256,
	pub collection_type: u8,
	/// Hypercert minter contract.
	pub collection: Address,
	/// Payment token; the zero address denotes the native currency.
	pub currency: Address,
	/// Seller.
	pub signer: Address,
	pub start_time: u64,
	pub end_time: u64,
	/// Price per unit, in the currency's smallest denomination.
	#[serde(with = "u256_serde")]
	pub price: U256,
	#[serde(with = "u256_serde::vec")]
	pub item_ids: Vec<U256>,
	#[serde(with = "u256_serde::vec")]
	pub amounts: Vec<U256>,
	#[serde(default)]
	pub additional_parameters: Bytes,
	/// Seller's signature over the order.
	pub signature: Bytes,
}

impl MakerOrder {
	/// Total price for `amount` units: `price * amount`.
	///
	/// Returns `None` on overflow of 256 bits.
	pub fn total_price(&self, amount: U256) -> Option<U256> {
		self.price.checked_mul(amount)
	}

	/// Whether the order is paid in the chain's native currency.
	pub fn is_native_currency(&self) -> bool {
		self.currency == Address::ZERO
	}
}

/// Buyer side of a trade, matched against a maker ask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakerBid {
	/// Address receiving the purchased fraction.
	pub recipient: Address,
	/// Strategy specific parameters, ABI encoded.
	pub additional_parameters: Bytes,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn order_json() -> serde_json::Value {
		serde_json::json!({
			"id": "b7c0c1d2",
			"chainId": 11155111,
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

	#[test]
	fn test_maker_order_from_marketplace_json() {
		let order: MakerOrder = serde_json::from_value(order_json()).unwrap();

		assert_eq!(order.chain_id, 11155111);
		assert_eq!(order.order_nonce, U256::from(3u64));
		assert_eq!(order.price, U256::from(1_000_000_000_000_000u64));
		assert_eq!(order.amounts, vec![U256::from(1u64)]);
		assert_eq!(
			order.item_ids[0].to_string(),
			"34028236692093846346337460743176821145600001"
		);
		assert_eq!(order.signature, Bytes::from(vec![0x12, 0x34]));
		assert!(!order.is_native_currency());
	}

	#[test]
	fn test_total_price_is_exact_beyond_f64_precision() {
		let mut order: MakerOrder = serde_json::from_value(order_json()).unwrap();
		// 2^53 + 1 cannot be represented by an f64
		order.price = U256::from(9_007_199_254_740_993u64);
		let amount = U256::from(9_007_199_254_740_993u64);

		let total = order.total_price(amount).unwrap();
		assert_eq!(total.to_string(), "81129638414606699710187514626049");
	}

	#[test]
	fn test_total_price_overflow_is_detected() {
		let mut order: MakerOrder = serde_json::from_value(order_json()).unwrap();
		order.price = U256::MAX;
		assert!(order.total_price(U256::from(2u64)).is_none());
		assert_eq!(order.total_price(U256::from(1u64)), Some(U256::MAX));
	}
}
