//! Purchase status state machine.
//!
//! The status moves Approval -> PreparingOrder -> SignForBuy -> Pending ->
//! Confirmed, with Failed reachable from every in-flight state. A new purchase
//! may only begin once the previous one reached a terminal status.

use crate::event_bus::EventBus;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::watch;
use voicedeck_types::{PurchaseEvent, TransactionStatus};

/// Errors that can occur while changing the purchase status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition {
		from: TransactionStatus,
		to: TransactionStatus,
	},
	#[error("A purchase is already in progress (status {0})")]
	PurchaseInProgress(TransactionStatus),
}

// Static transition table - each status maps to allowed next statuses
static TRANSITIONS: Lazy<HashMap<TransactionStatus, HashSet<TransactionStatus>>> =
	Lazy::new(|| {
		use TransactionStatus::*;

		let mut m = HashMap::new();
		// Only `begin` may leave these.
		m.insert(Idle, HashSet::from([Approval]));
		m.insert(Confirmed, HashSet::from([Approval]));
		m.insert(Failed, HashSet::from([Approval]));
		m.insert(Approval, HashSet::from([PreparingOrder, Failed]));
		m.insert(PreparingOrder, HashSet::from([SignForBuy, Failed]));
		m.insert(SignForBuy, HashSet::from([Pending, Failed]));
		m.insert(Pending, HashSet::from([Confirmed, Failed]));
		m
	});

fn is_valid_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|allowed| allowed.contains(&to))
}

/// Owns the status cell of the purchase flow.
///
/// The current value is observable through a watch channel and every change
/// is published as `PurchaseEvent::StatusChanged`.
pub struct PurchaseStateMachine {
	status: watch::Sender<TransactionStatus>,
	event_bus: EventBus,
}

impl PurchaseStateMachine {
	pub fn new(event_bus: EventBus) -> Self {
		let (status, _) = watch::channel(TransactionStatus::Idle);
		Self { status, event_bus }
	}

	/// Current status.
	pub fn current(&self) -> TransactionStatus {
		*self.status.borrow()
	}

	/// Receiver notified on every status change.
	pub fn subscribe(&self) -> watch::Receiver<TransactionStatus> {
		self.status.subscribe()
	}

	/// Starts a new purchase by moving to `Approval`.
	///
	/// Check and update happen atomically, so of two concurrent callers only
	/// one can begin.
	pub fn begin(&self) -> Result<(), StateError> {
		let mut previous = TransactionStatus::Idle;
		let started = self.status.send_if_modified(|status| {
			previous = *status;
			if is_valid_transition(*status, TransactionStatus::Approval) {
				*status = TransactionStatus::Approval;
				true
			} else {
				false
			}
		});

		if !started {
			return Err(StateError::PurchaseInProgress(previous));
		}
		self.announce(previous, TransactionStatus::Approval);
		Ok(())
	}

	/// Moves an in-flight purchase to `to`.
	pub fn transition(&self, to: TransactionStatus) -> Result<(), StateError> {
		let mut from = TransactionStatus::Idle;
		let changed = self.status.send_if_modified(|status| {
			from = *status;
			// Approval is entered through `begin` only.
			if to != TransactionStatus::Approval && is_valid_transition(*status, to) {
				*status = to;
				true
			} else {
				false
			}
		});

		if !changed {
			return Err(StateError::InvalidTransition { from, to });
		}
		self.announce(from, to);
		Ok(())
	}

	fn announce(&self, from: TransactionStatus, to: TransactionStatus) {
		tracing::debug!(%from, %to, "Purchase status changed");
		self.event_bus
			.publish(PurchaseEvent::StatusChanged { from, to })
			.ok();
	}
}
