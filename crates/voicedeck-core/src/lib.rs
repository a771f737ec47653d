//! Core purchase engine for the VoiceDeck marketplace.
//!
//! This module ties the chain client, the marketplace client and the
//! contribution recorder together into the purchase flow. It owns the
//! observable purchase state (status, transaction hash, contribution status),
//! publishes progress on an event bus and provides a builder that assembles
//! everything from configuration.

pub mod builder;
pub mod event_bus;
pub mod orchestrator;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{BuilderError, MarketplaceBuilder, MarketplaceFactories};
pub use event_bus::EventBus;
pub use orchestrator::{PreparedPurchase, PurchaseError, PurchaseOrchestrator};
pub use state::{PurchaseStateMachine, StateError};
