//! Purchase orchestration.
//!
//! Drives one purchase through its phases: allowance check and conditional
//! ERC-20 approval, order execution, confirmation, and the background write of
//! the contribution record. Progress is exposed through the status state
//! machine, a transaction hash cell, a contribution status cell and the event
//! bus.

use crate::event_bus::EventBus;
use crate::state::{PurchaseStateMachine, StateError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::instrument;
use voicedeck_contributions::ContributionService;
use voicedeck_delivery::DeliveryService;
use voicedeck_exchange::ExchangeService;
use voicedeck_types::{
	format_token_amount, truncate_id, Address, ContributionRecord, ContributionStatus,
	FailureStage, MakerOrder, NetworksConfig, PurchaseEvent, PurchaseOutcome, PurchaseRequest,
	PurchaseStateResponse, TakerBid, TransactionHash, TransactionStatus, U256,
};

/// Errors returned before a purchase starts.
///
/// None of these change the observable status.
#[derive(Debug, Error)]
pub enum PurchaseError {
	#[error("No order found")]
	MissingOrder,
	#[error("No chain client configured for chain {0}")]
	NoChainClient(u64),
	#[error("Amount must be greater than zero")]
	InvalidAmount,
	#[error("Total price overflows 256 bits")]
	PriceOverflow,
	#[error("A purchase is already in progress (status {0})")]
	PurchaseInProgress(TransactionStatus),
	#[error("Invalid order: {0}")]
	InvalidOrder(String),
}

/// A purchase that passed its preconditions and owns the status cell.
///
/// Produced by [`PurchaseOrchestrator::prepare`], consumed by
/// [`PurchaseOrchestrator::execute`].
#[derive(Debug)]
pub struct PreparedPurchase {
	id: String,
	order: MakerOrder,
	taker: TakerBid,
	amount: U256,
	total: U256,
	hypercert_id: Option<String>,
	comment: Option<String>,
}

impl PreparedPurchase {
	pub fn id(&self) -> &str {
		&self.id
	}

	/// `price × amount`, the amount the approval must cover.
	pub fn total(&self) -> U256 {
		self.total
	}
}

/// Coordinates the marketplace client, the chain client and the contribution
/// recorder for one purchase at a time.
pub struct PurchaseOrchestrator {
	delivery: Arc<DeliveryService>,
	exchange: Arc<ExchangeService>,
	contributions: Arc<ContributionService>,
	/// Used for log formatting of token amounts.
	networks: NetworksConfig,
	state: PurchaseStateMachine,
	event_bus: EventBus,
	purchase_id: Arc<watch::Sender<Option<String>>>,
	transaction_hash: watch::Sender<Option<TransactionHash>>,
	contribution: Arc<watch::Sender<ContributionStatus>>,
	contribution_task: Mutex<Option<JoinHandle<()>>>,
}

impl PurchaseOrchestrator {
	pub fn new(
		delivery: Arc<DeliveryService>,
		exchange: Arc<ExchangeService>,
		contributions: Arc<ContributionService>,
		networks: NetworksConfig,
		event_bus: EventBus,
	) -> Self {
		Self {
			delivery,
			exchange,
			contributions,
			networks,
			state: PurchaseStateMachine::new(event_bus.clone()),
			event_bus,
			purchase_id: Arc::new(watch::channel(None).0),
			transaction_hash: watch::channel(None).0,
			contribution: Arc::new(watch::channel(ContributionStatus::NotStarted).0),
			contribution_task: Mutex::new(None),
		}
	}

	/// Current purchase status.
	pub fn status(&self) -> TransactionStatus {
		self.state.current()
	}

	/// Receiver notified on every status change.
	pub fn subscribe_status(&self) -> watch::Receiver<TransactionStatus> {
		self.state.subscribe()
	}

	/// Hash of the order execution of the latest purchase, once submitted.
	pub fn transaction_hash(&self) -> Option<TransactionHash> {
		*self.transaction_hash.borrow()
	}

	/// State of the contribution record of the latest purchase.
	pub fn contribution_status(&self) -> ContributionStatus {
		self.contribution.borrow().clone()
	}

	/// Identifier of the latest purchase.
	pub fn purchase_id(&self) -> Option<String> {
		self.purchase_id.borrow().clone()
	}

	/// Event bus carrying purchase events.
	pub fn events(&self) -> &EventBus {
		&self.event_bus
	}

	/// Snapshot of all observable cells.
	pub fn current_state(&self) -> PurchaseStateResponse {
		PurchaseStateResponse {
			purchase_id: self.purchase_id(),
			status: self.status(),
			transaction_hash: self.transaction_hash(),
			contribution: self.contribution_status(),
		}
	}

	/// Wallet address paying for purchases on `chain_id`.
	pub fn wallet_address(&self, chain_id: u64) -> Result<Address, PurchaseError> {
		self.delivery
			.sender(chain_id)
			.map_err(|_| PurchaseError::NoChainClient(chain_id))
	}

	/// Waits for the background contribution write of the latest purchase and
	/// returns its final state.
	pub async fn wait_for_contribution(&self) -> ContributionStatus {
		let task = self.contribution_task.lock().await.take();
		if let Some(task) = task {
			if let Err(e) = task.await {
				tracing::error!(error = %e, "Contribution task panicked");
			}
		}
		self.contribution_status()
	}

	/// Runs a complete purchase.
	///
	/// Precondition violations are returned as `Err` without touching the
	/// status. Every purchase that starts ends in `Confirmed` or `Failed`.
	pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseOutcome, PurchaseError> {
		let prepared = self.prepare(request)?;
		Ok(self.execute(prepared).await)
	}

	/// Checks preconditions, builds the taker bid and claims the status cell.
	pub fn prepare(&self, request: PurchaseRequest) -> Result<PreparedPurchase, PurchaseError> {
		let order = request.order.ok_or(PurchaseError::MissingOrder)?;
		if !self.delivery.supports(order.chain_id) {
			return Err(PurchaseError::NoChainClient(order.chain_id));
		}
		if request.amount.is_zero() {
			return Err(PurchaseError::InvalidAmount);
		}
		let total = order
			.total_price(request.amount)
			.ok_or(PurchaseError::PriceOverflow)?;

		let taker = self
			.exchange
			.create_fractional_sale_taker_bid(&order, request.buyer, request.amount, order.price)
			.map_err(|e| PurchaseError::InvalidOrder(e.to_string()))?;

		self.state.begin().map_err(|e| match e {
			StateError::PurchaseInProgress(status) => PurchaseError::PurchaseInProgress(status),
			StateError::InvalidTransition { from, .. } => PurchaseError::PurchaseInProgress(from),
		})?;

		let id = uuid::Uuid::new_v4().to_string();
		// The id must change before the contribution cell is reset.
		self.purchase_id.send_replace(Some(id.clone()));
		self.transaction_hash.send_replace(None);
		self.contribution.send_replace(ContributionStatus::NotStarted);

		tracing::info!(
			purchase_id = %truncate_id(&id),
			chain_id = order.chain_id,
			amount = %request.amount,
			total = %total,
			"Purchase started"
		);

		Ok(PreparedPurchase {
			id,
			order,
			taker,
			amount: request.amount,
			total,
			hypercert_id: request.hypercert_id,
			comment: request.comment,
		})
	}

	/// Runs a prepared purchase to its outcome.
	#[instrument(skip_all, fields(purchase_id = %truncate_id(&prepared.id), chain_id = prepared.order.chain_id))]
	pub async fn execute(&self, prepared: PreparedPurchase) -> PurchaseOutcome {
		let _settle = SettleOnDrop { orchestrator: self };

		if let Err(reason) = self.ensure_allowance(&prepared).await {
			return self.fail(FailureStage::Approval, reason);
		}

		self.advance(TransactionStatus::PreparingOrder);
		let chain_id = prepared.order.chain_id;
		let tx = match self
			.exchange
			.execute_order(&prepared.order, &prepared.taker, &prepared.order.signature)
			.await
		{
			Ok(tx) => tx,
			Err(e) => return self.fail(FailureStage::Execution, e.to_string()),
		};

		self.advance(TransactionStatus::SignForBuy);
		let tx_hash = match self.delivery.deliver(tx).await {
			Ok(hash) => hash,
			Err(e) => return self.fail(FailureStage::Execution, e.to_string()),
		};
		tracing::info!(tx_hash = %tx_hash, "Order execution submitted");
		self.event_bus
			.publish(PurchaseEvent::OrderSubmitted { chain_id, tx_hash })
			.ok();

		self.spawn_contribution(
			prepared.id.clone(),
			ContributionRecord {
				tx_id: tx_hash,
				hypercert_id: prepared.hypercert_id.clone(),
				amount: prepared.amount,
				comment: prepared.comment.clone(),
			},
		)
		.await;

		self.transaction_hash.send_replace(Some(tx_hash));
		self.advance(TransactionStatus::Pending);

		match self.delivery.confirm(&tx_hash, chain_id).await {
			Ok(receipt) if receipt.success => {
				self.advance(TransactionStatus::Confirmed);
				tracing::info!(
					tx_hash = %receipt.hash,
					block_number = receipt.block_number,
					"Purchase confirmed"
				);
				self.event_bus
					.publish(PurchaseEvent::Confirmed {
						receipt: receipt.clone(),
					})
					.ok();
				PurchaseOutcome::Confirmed { receipt }
			},
			Ok(receipt) => self.fail(
				FailureStage::Confirmation,
				format!("Order execution {} reverted", receipt.hash),
			),
			Err(e) => self.fail(FailureStage::Confirmation, e.to_string()),
		}
	}

	/// Approves the exchange for `total` unless the allowance already covers
	/// it. Native currency orders need no approval.
	async fn ensure_allowance(&self, prepared: &PreparedPurchase) -> Result<(), String> {
		let order = &prepared.order;
		if order.is_native_currency() {
			tracing::debug!("Native currency order, skipping allowance check");
			return Ok(());
		}

		let chain_id = order.chain_id;
		let owner = self.delivery.sender(chain_id).map_err(|e| e.to_string())?;
		let spender = self.exchange.spender(chain_id).map_err(|e| e.to_string())?;
		let allowance = self
			.delivery
			.get_allowance(chain_id, owner, spender, order.currency)
			.await
			.map_err(|e| format!("Failed to read allowance: {}", e))?;

		if allowance >= prepared.total {
			tracing::debug!(%allowance, "Allowance sufficient");
			return Ok(());
		}

		tracing::info!(
			currency = %order.currency,
			amount = %self.display_amount(chain_id, &order.currency, prepared.total),
			"Approving exchange"
		);
		let tx = self
			.exchange
			.approve_erc20(chain_id, order.currency, prepared.total)
			.await
			.map_err(|e| e.to_string())?;
		let tx_hash = self
			.delivery
			.deliver(tx)
			.await
			.map_err(|e| format!("Failed to submit approval: {}", e))?;
		self.event_bus
			.publish(PurchaseEvent::ApprovalSubmitted {
				chain_id,
				tx_hash,
				amount: prepared.total,
			})
			.ok();

		let receipt = self
			.delivery
			.confirm(&tx_hash, chain_id)
			.await
			.map_err(|e| format!("Approval {} not confirmed: {}", tx_hash, e))?;
		if !receipt.success {
			return Err(format!("Approval {} reverted", tx_hash));
		}

		tracing::info!(tx_hash = %tx_hash, "Approval confirmed");
		Ok(())
	}

	/// Posts the contribution record in the background.
	async fn spawn_contribution(&self, purchase_id: String, record: ContributionRecord) {
		self.contribution.send_replace(ContributionStatus::InFlight);

		let contributions = Arc::clone(&self.contributions);
		let contribution = Arc::clone(&self.contribution);
		let current_purchase = Arc::clone(&self.purchase_id);
		let event_bus = self.event_bus.clone();

		let task = tokio::spawn(async move {
			let tx_hash = record.tx_id;
			let (status, event) = match contributions.record(&record).await {
				Ok(()) => (
					ContributionStatus::Recorded,
					PurchaseEvent::ContributionRecorded { tx_hash },
				),
				Err(e) => (
					ContributionStatus::Failed(e.to_string()),
					PurchaseEvent::ContributionFailed {
						tx_hash,
						error: e.to_string(),
					},
				),
			};

			// Checked under the cell's lock; `prepare` swaps the id before it
			// resets the cell, so a newer purchase is never overwritten.
			contribution.send_if_modified(|cell| {
				if current_purchase.borrow().as_deref() != Some(purchase_id.as_str()) {
					return false;
				}
				*cell = status;
				true
			});
			event_bus.publish(event).ok();
		});

		*self.contribution_task.lock().await = Some(task);
	}

	fn advance(&self, to: TransactionStatus) {
		if let Err(e) = self.state.transition(to) {
			tracing::error!(error = %e, "Rejected status change");
		}
	}

	fn fail(&self, stage: FailureStage, reason: String) -> PurchaseOutcome {
		tracing::error!(%stage, %reason, "Purchase failed");
		self.advance(TransactionStatus::Failed);
		self.event_bus
			.publish(PurchaseEvent::Failed {
				stage,
				reason: reason.clone(),
			})
			.ok();
		PurchaseOutcome::Failed { stage, reason }
	}

	fn display_amount(&self, chain_id: u64, currency: &Address, amount: U256) -> String {
		match self
			.networks
			.get(&chain_id)
			.and_then(|network| network.currency(currency))
		{
			Some(config) => format!(
				"{} {}",
				format_token_amount(&amount.to_string(), config.decimals),
				config.symbol
			),
			None => amount.to_string(),
		}
	}
}

/// Fails a purchase whose `execute` future is dropped before it settled, so
/// the status cell never stays claimed.
struct SettleOnDrop<'a> {
	orchestrator: &'a PurchaseOrchestrator,
}

impl Drop for SettleOnDrop<'_> {
	fn drop(&mut self) {
		let stage = match self.orchestrator.status() {
			TransactionStatus::Approval => FailureStage::Approval,
			TransactionStatus::PreparingOrder | TransactionStatus::SignForBuy => {
				FailureStage::Execution
			},
			TransactionStatus::Pending => FailureStage::Confirmation,
			_ => return,
		};
		self.orchestrator
			.fail(stage, "Purchase cancelled before it settled".to_string());
	}
}
