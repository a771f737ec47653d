//! Utility functions for display formatting and serde conversions.

pub mod formatting;
pub mod u256_serde;

pub use formatting::{format_token_amount, truncate_id};
