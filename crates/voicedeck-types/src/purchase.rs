//! Purchase flow types.
//!
//! These types describe one attempt at buying a fraction of a hypercert: the
//! request, the status value observed by clients while it runs, its final
//! outcome, and the contribution record written to the backend.

use crate::utils::u256_serde;
use crate::{MakerOrder, TransactionHash, TransactionReceipt};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Input of a purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
	/// Maker order to buy from.
	pub order: Option<MakerOrder>,
	/// Number of fraction units to buy.
	pub amount: U256,
	/// Buyer, who also receives the fraction.
	pub buyer: Address,
	/// Hypercert the order belongs to, forwarded to the contribution record.
	pub hypercert_id: Option<String>,
	/// Free-text comment left by the contributor.
	pub comment: Option<String>,
}

/// Progress of a purchase as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
	/// No purchase has been started yet.
	Idle,
	/// Milestone shown right before the wallet is asked to sign the purchase.
	PreparingOrder,
	/// Checking and, if needed, raising the ERC-20 allowance.
	Approval,
	/// Waiting for the buyer to sign the order execution.
	SignForBuy,
	/// Order execution submitted, waiting for confirmation.
	Pending,
	Confirmed,
	Failed,
}

impl TransactionStatus {
	/// `Confirmed` and `Failed` end an invocation.
	pub fn is_terminal(&self) -> bool {
		matches!(self, TransactionStatus::Confirmed | TransactionStatus::Failed)
	}
}

impl fmt::Display for TransactionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			TransactionStatus::Idle => "idle",
			TransactionStatus::PreparingOrder => "preparingOrder",
			TransactionStatus::Approval => "approval",
			TransactionStatus::SignForBuy => "signForBuy",
			TransactionStatus::Pending => "pending",
			TransactionStatus::Confirmed => "confirmed",
			TransactionStatus::Failed => "failed",
		};
		f.write_str(name)
	}
}

/// State of the background contribution recording task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum ContributionStatus {
	NotStarted,
	InFlight,
	Recorded,
	Failed(String),
}

/// Phase of the purchase in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureStage {
	/// Allowance lookup, approval submission or approval confirmation.
	Approval,
	/// Building or submitting the order execution.
	Execution,
	/// Waiting for the execution receipt, or the execution reverted.
	Confirmation,
}

impl fmt::Display for FailureStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FailureStage::Approval => f.write_str("approval"),
			FailureStage::Execution => f.write_str("execution"),
			FailureStage::Confirmation => f.write_str("confirmation"),
		}
	}
}

/// Result of a purchase that passed its preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PurchaseOutcome {
	Confirmed {
		receipt: TransactionReceipt,
	},
	Failed {
		stage: FailureStage,
		reason: String,
	},
}

impl PurchaseOutcome {
	/// Confirmation receipt, present only for confirmed purchases.
	pub fn receipt(&self) -> Option<&TransactionReceipt> {
		match self {
			PurchaseOutcome::Confirmed { receipt } => Some(receipt),
			PurchaseOutcome::Failed { .. } => None,
		}
	}

	pub fn is_confirmed(&self) -> bool {
		matches!(self, PurchaseOutcome::Confirmed { .. })
	}
}

/// Record of a purchase posted to the contributions endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionRecord {
	/// Hash of the order execution transaction.
	pub tx_id: TransactionHash,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hypercert_id: Option<String>,
	/// Sent as a JSON integer.
	#[serde(with = "u256_serde::number")]
	pub amount: U256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::B256;

	#[test]
	fn test_status_wire_names() {
		assert_eq!(
			serde_json::to_string(&TransactionStatus::SignForBuy).unwrap(),
			"\"signForBuy\""
		);
		assert_eq!(TransactionStatus::PreparingOrder.to_string(), "preparingOrder");
		assert!(TransactionStatus::Failed.is_terminal());
		assert!(!TransactionStatus::Pending.is_terminal());
	}

	#[test]
	fn test_contribution_record_body() {
		let record = ContributionRecord {
			tx_id: TransactionHash(B256::repeat_byte(0x11)),
			hypercert_id: Some("11155111-0xa16D-3402823669209384634633746074317682114560".into()),
			amount: U256::from(25u64),
			comment: None,
		};

		let body = serde_json::to_value(&record).unwrap();
		assert_eq!(body["txId"], format!("0x{}", "11".repeat(32)));
		assert_eq!(body["amount"], 25);
		assert!(body["amount"].is_number());
		assert!(body.get("comment").is_none());
		assert!(body["hypercertId"].as_str().unwrap().starts_with("11155111-"));
	}

	#[test]
	fn test_outcome_receipt_only_when_confirmed() {
		let failed = PurchaseOutcome::Failed {
			stage: FailureStage::Execution,
			reason: "user rejected".into(),
		};
		assert!(failed.receipt().is_none());
		assert!(!failed.is_confirmed());
	}
}
