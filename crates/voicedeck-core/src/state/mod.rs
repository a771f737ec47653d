//! State management for purchases.
//!
//! This module provides the status state machine of the purchase flow,
//! ensuring the observable status only moves along valid transitions.

pub mod purchase;

pub use purchase::{PurchaseStateMachine, StateError};
