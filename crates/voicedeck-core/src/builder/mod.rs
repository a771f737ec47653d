//! Builder pattern for constructing the purchase orchestrator.
//!
//! Instantiates the chain clients, the marketplace client and the contribution
//! recorder named in the configuration through their factory functions, then
//! wires them into a `PurchaseOrchestrator`.

use crate::event_bus::EventBus;
use crate::orchestrator::PurchaseOrchestrator;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use voicedeck_config::Config;
use voicedeck_contributions::{ContributionError, ContributionInterface, ContributionService};
use voicedeck_delivery::{DeliveryError, DeliveryInterface, DeliveryService};
use voicedeck_exchange::{ExchangeError, ExchangeInterface, ExchangeService};
use voicedeck_types::{NetworksConfig, SecretString};

/// Errors that can occur while building the orchestrator.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation
/// name.
pub struct MarketplaceFactories<DF, EF, CF> {
	pub delivery_factories: HashMap<String, DF>,
	pub exchange_factories: HashMap<String, EF>,
	pub contribution_factories: HashMap<String, CF>,
}

/// Builder for constructing a `PurchaseOrchestrator` from configuration.
pub struct MarketplaceBuilder {
	config: Config,
}

impl MarketplaceBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the orchestrator using factories for each component type.
	pub fn build<DF, EF, CF>(
		self,
		factories: MarketplaceFactories<DF, EF, CF>,
	) -> Result<PurchaseOrchestrator, BuilderError>
	where
		DF: Fn(
			&toml::Value,
			&NetworksConfig,
			&SecretString,
		) -> Result<Box<dyn DeliveryInterface>, DeliveryError>,
		EF: Fn(&toml::Value, &NetworksConfig) -> Result<Box<dyn ExchangeInterface>, ExchangeError>,
		CF: Fn(&toml::Value) -> Result<Box<dyn ContributionInterface>, ContributionError>,
	{
		let config = &self.config;

		// Create delivery implementations
		let mut delivery_implementations = Vec::new();
		for (name, implementation_config) in &config.delivery.implementations {
			let factory = factories.delivery_factories.get(name).ok_or_else(|| {
				BuilderError::Config(format!("Unknown delivery implementation '{}'", name))
			})?;

			match factory(
				implementation_config,
				&config.networks,
				&config.wallet.private_key,
			) {
				Ok(implementation) => {
					for network_id in implementation.supported_networks() {
						tracing::info!(component = "delivery", implementation = %name, network_id, "Loaded");
					}
					delivery_implementations.push(implementation);
				},
				Err(e) => {
					tracing::error!(
						component = "delivery",
						implementation = %name,
						error = %e,
						"Failed to create delivery implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create delivery implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if delivery_implementations.is_empty() {
			return Err(BuilderError::MissingComponent(
				"no delivery implementation configured".to_string(),
			));
		}

		let delivery = Arc::new(DeliveryService::new(
			delivery_implementations,
			config.delivery.min_confirmations,
		));

		// Create the primary exchange implementation
		let exchange = {
			let primary = &config.exchange.primary;
			let factory = factories.exchange_factories.get(primary).ok_or_else(|| {
				BuilderError::MissingComponent(format!("exchange implementation '{}'", primary))
			})?;
			let implementation_config = config.exchange.implementations.get(primary).ok_or_else(|| {
				BuilderError::Config(format!("Primary exchange '{}' is not configured", primary))
			})?;

			let implementation = factory(implementation_config, &config.networks).map_err(|e| {
				tracing::error!(component = "exchange", implementation = %primary, error = %e, "Failed to create exchange implementation");
				BuilderError::Config(format!(
					"Failed to create exchange implementation '{}': {}",
					primary, e
				))
			})?;
			tracing::info!(component = "exchange", implementation = %primary, "Loaded");
			Arc::new(ExchangeService::new(implementation))
		};

		// Create the primary contribution recorder
		let contributions = {
			let primary = &config.contributions.primary;
			let factory = factories
				.contribution_factories
				.get(primary)
				.ok_or_else(|| {
					BuilderError::MissingComponent(format!(
						"contribution implementation '{}'",
						primary
					))
				})?;
			let implementation_config = config
				.contributions
				.implementations
				.get(primary)
				.ok_or_else(|| {
					BuilderError::Config(format!(
						"Primary contribution recorder '{}' is not configured",
						primary
					))
				})?;

			let implementation = factory(implementation_config).map_err(|e| {
				tracing::error!(component = "contributions", implementation = %primary, error = %e, "Failed to create contribution recorder");
				BuilderError::Config(format!(
					"Failed to create contribution recorder '{}': {}",
					primary, e
				))
			})?;
			tracing::info!(component = "contributions", implementation = %primary, "Loaded");
			Arc::new(ContributionService::new(implementation))
		};

		Ok(PurchaseOrchestrator::new(
			delivery,
			exchange,
			contributions,
			config.networks.clone(),
			EventBus::new(1000),
		))
	}
}
