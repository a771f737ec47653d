//! Contribution recording for completed purchases.
//!
//! After an order execution is submitted, a record of the purchase is written
//! to the VoiceDeck backend. Recording is a side channel: its failures are
//! reported to the caller but never change the purchase outcome.

use async_trait::async_trait;
use thiserror::Error;
use voicedeck_types::{ConfigSchema, ContributionRecord, ImplementationRegistry};

/// Re-export implementations
pub mod implementations {
	pub mod http;
}

/// Errors that can occur while recording a contribution.
#[derive(Debug, Error)]
pub enum ContributionError {
	/// The request could not be sent or no response arrived.
	#[error("Network error: {0}")]
	Network(String),
	/// The backend answered with a non-success status.
	#[error("Rejected with status {status}: {body}")]
	Rejected { status: u16, body: String },
	/// Invalid implementation configuration.
	#[error("Invalid configuration: {0}")]
	Configuration(String),
}

/// Interface of a contribution backend.
#[async_trait]
pub trait ContributionInterface: Send + Sync {
	/// Returns the configuration schema for this recorder.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Persists a contribution record.
	async fn record(&self, record: &ContributionRecord) -> Result<(), ContributionError>;
}

/// Type alias for contribution recorder factory functions.
pub type ContributionFactory =
	fn(&toml::Value) -> Result<Box<dyn ContributionInterface>, ContributionError>;

/// Registry trait for contribution recorder implementations.
pub trait ContributionRegistry: ImplementationRegistry<Factory = ContributionFactory> {}

/// Get all registered contribution recorder implementations.
pub fn get_all_implementations() -> Vec<(&'static str, ContributionFactory)> {
	use implementations::http;

	vec![(http::Registry::NAME, http::Registry::factory())]
}

/// Service wrapping the configured contribution recorder.
pub struct ContributionService {
	recorder: Box<dyn ContributionInterface>,
}

impl ContributionService {
	pub fn new(recorder: Box<dyn ContributionInterface>) -> Self {
		Self { recorder }
	}

	/// Writes a record, logging the result.
	pub async fn record(&self, record: &ContributionRecord) -> Result<(), ContributionError> {
		match self.recorder.record(record).await {
			Ok(()) => {
				tracing::info!(tx_id = %record.tx_id, "Contribution recorded");
				Ok(())
			},
			Err(e) => {
				tracing::warn!(tx_id = %record.tx_id, error = %e, "Failed to record contribution");
				Err(e)
			},
		}
	}
}
