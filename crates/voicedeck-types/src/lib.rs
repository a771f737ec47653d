//! Common types module for the VoiceDeck marketplace service.
//!
//! This module defines the data types shared by every crate of the workspace:
//! marketplace orders, chain transactions, purchase status values, events and
//! the configuration validation framework.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Chain transaction types: hashes, receipts and unsigned transactions.
pub mod delivery;
/// Event types published while a purchase progresses.
pub mod events;
/// Network and currency configuration types.
pub mod networks;
/// Marketplace order types: maker orders and taker bids.
pub mod order;
/// Purchase flow types: requests, statuses, outcomes and contribution records.
pub mod purchase;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Redacting string wrapper for private keys.
pub mod secret_string;
/// Utility functions for formatting and serde helpers.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use api::*;
pub use delivery::*;
pub use events::*;
pub use networks::{CurrencyConfig, NetworkConfig, NetworksConfig};
pub use order::*;
pub use purchase::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use utils::{format_token_amount, truncate_id, u256_serde};
pub use validation::*;
