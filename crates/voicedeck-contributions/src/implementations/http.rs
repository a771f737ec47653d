//! HTTP contribution recorder.
//!
//! Posts each record as JSON to the backend's contributions endpoint.

use crate::{ContributionError, ContributionInterface};
use async_trait::async_trait;
use std::time::Duration;
use voicedeck_types::{ConfigSchema, ContributionRecord, Field, FieldType, Schema, ValidationError};

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Records contributions with `POST <endpoint>`.
pub struct HttpContributionRecorder {
	client: reqwest::Client,
	endpoint: String,
}

impl HttpContributionRecorder {
	pub fn new(endpoint: String, timeout: Duration) -> Result<Self, ContributionError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ContributionError::Configuration(e.to_string()))?;

		Ok(Self { client, endpoint })
	}
}

/// Configuration schema for the HTTP recorder.
pub struct HttpContributionSchema;

impl HttpContributionSchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		Self.validate(config)
	}
}

impl ConfigSchema for HttpContributionSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("endpoint", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					_ => Err("endpoint must be an http(s) URL".to_string()),
				}
			})],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl ContributionInterface for HttpContributionRecorder {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpContributionSchema)
	}

	async fn record(&self, record: &ContributionRecord) -> Result<(), ContributionError> {
		let response = self
			.client
			.post(&self.endpoint)
			.json(record)
			.send()
			.await
			.map_err(|e| ContributionError::Network(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return Ok(());
		}

		let body = response.text().await.unwrap_or_default();
		Err(ContributionError::Rejected {
			status: status.as_u16(),
			body,
		})
	}
}

/// Factory function to create the HTTP recorder.
///
/// # Parameters
/// - `config`: TOML table containing:
///   - `endpoint` (required): URL receiving the POST
///   - `timeout_seconds` (optional): request timeout, 10 seconds by default
pub fn create_http_recorder(
	config: &toml::Value,
) -> Result<Box<dyn ContributionInterface>, ContributionError> {
	HttpContributionSchema::validate_config(config)
		.map_err(|e| ContributionError::Configuration(e.to_string()))?;

	let endpoint = config
		.get("endpoint")
		.and_then(|v| v.as_str())
		.ok_or_else(|| ContributionError::Configuration("endpoint is required".to_string()))?
		.to_string();

	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|secs| secs as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(HttpContributionRecorder::new(
		endpoint,
		Duration::from_secs(timeout),
	)?))
}

/// Registry for the HTTP recorder.
pub struct Registry;

impl voicedeck_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = crate::ContributionFactory;

	fn factory() -> Self::Factory {
		create_http_recorder
	}
}

impl crate::ContributionRegistry for Registry {}
