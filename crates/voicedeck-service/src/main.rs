//! Main entry point for the VoiceDeck marketplace service.
//!
//! This binary buys fractions of hypercerts on the hypercerts exchange on
//! behalf of the configured wallet. By default it serves the purchase HTTP
//! API; the `purchase` subcommand runs a single purchase from the command line.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use voicedeck_config::Config;
use voicedeck_core::{MarketplaceBuilder, MarketplaceFactories, PurchaseOrchestrator};
use voicedeck_types::{Address, MakerOrder, PurchaseRequest, U256};

mod apis;
mod server;
#[cfg(test)]
mod testing;

// Import implementations from individual crates
use voicedeck_contributions::implementations::http::create_http_recorder;
use voicedeck_delivery::implementations::evm::alloy::create_http_delivery;
use voicedeck_exchange::implementations::hypercerts::create_exchange;

/// Command-line arguments for the marketplace service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Serve the purchase API (default)
	Serve,
	/// Buy from a maker order once and print the outcome
	Purchase {
		/// JSON file holding the maker order
		#[arg(long)]
		order: PathBuf,
		/// Number of units to buy
		#[arg(long)]
		amount: U256,
		/// Recipient of the fraction; defaults to the wallet
		#[arg(long)]
		buyer: Option<Address>,
		#[arg(long)]
		hypercert_id: Option<String>,
		#[arg(long)]
		comment: Option<String>,
	},
}

/// Main entry point for the marketplace service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the purchase orchestrator with all implementations
/// 5. Serves the API or runs a single purchase
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started voicedeck");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.marketplace.id);

	let orchestrator = Arc::new(build_marketplace(config.clone())?);

	match args.command.unwrap_or(Command::Serve) {
		Command::Serve => {
			let Some(api_config) = config.api.clone().filter(|api| api.enabled) else {
				return Err("API server is disabled; enable [api] or use the purchase command".into());
			};
			server::start_server(api_config, orchestrator).await?;
		},
		Command::Purchase {
			order,
			amount,
			buyer,
			hypercert_id,
			comment,
		} => {
			let order: MakerOrder =
				serde_json::from_str(&tokio::fs::read_to_string(&order).await?)?;
			let buyer = match buyer {
				Some(buyer) => buyer,
				None => orchestrator.wallet_address(order.chain_id)?,
			};

			let outcome = orchestrator
				.purchase(PurchaseRequest {
					order: Some(order),
					amount,
					buyer,
					hypercert_id,
					comment,
				})
				.await?;
			let contribution = orchestrator.wait_for_contribution().await;

			println!(
				"{}",
				serde_json::to_string_pretty(&serde_json::json!({
					"outcome": outcome,
					"contribution": contribution,
				}))?
			);
		},
	}

	tracing::info!("Stopped voicedeck");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};

    // Variant for factories that take networks config
    ($interface:path, $error:path, networks, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value, &voicedeck_types::NetworksConfig) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};

    // Variant for delivery factories that take networks and the wallet key
    ($interface:path, $error:path, delivery, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value, &voicedeck_types::NetworksConfig, &voicedeck_types::SecretString) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the purchase orchestrator with all available implementations.
fn build_marketplace(config: Config) -> Result<PurchaseOrchestrator, Box<dyn std::error::Error>> {
	let builder = MarketplaceBuilder::new(config);

	let delivery_factories = create_factory_map!(
		voicedeck_delivery::DeliveryInterface,
		voicedeck_delivery::DeliveryError,
		delivery,
		"evm_alloy" => create_http_delivery,
	);

	let exchange_factories = create_factory_map!(
		voicedeck_exchange::ExchangeInterface,
		voicedeck_exchange::ExchangeError,
		networks,
		"hypercerts" => create_exchange,
	);

	let contribution_factories = create_factory_map!(
		voicedeck_contributions::ContributionInterface,
		voicedeck_contributions::ContributionError,
		"http" => create_http_recorder,
	);

	let factories = MarketplaceFactories {
		delivery_factories,
		exchange_factories,
		contribution_factories,
	};

	Ok(builder.build(factories)?)
}
