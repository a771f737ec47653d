//! Event types published while a purchase progresses.
//!
//! Events flow through the orchestrator's broadcast event bus so that API
//! handlers, loggers and tests can follow a purchase without polling.

use crate::{FailureStage, TransactionHash, TransactionReceipt, TransactionStatus};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Events emitted by the purchase orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseEvent {
	/// The status cell moved from one value to another.
	StatusChanged {
		from: TransactionStatus,
		to: TransactionStatus,
	},
	/// An ERC-20 approval was submitted for `amount`.
	ApprovalSubmitted {
		chain_id: u64,
		tx_hash: TransactionHash,
		amount: U256,
	},
	/// The order execution was submitted.
	OrderSubmitted {
		chain_id: u64,
		tx_hash: TransactionHash,
	},
	/// The order execution was confirmed on chain.
	Confirmed { receipt: TransactionReceipt },
	/// The purchase ended without a confirmed execution.
	Failed { stage: FailureStage, reason: String },
	/// The contribution record was accepted by the backend.
	ContributionRecorded { tx_hash: TransactionHash },
	/// Writing the contribution record failed.
	ContributionFailed {
		tx_hash: TransactionHash,
		error: String,
	},
}
