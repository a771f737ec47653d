//! Configuration module for the VoiceDeck marketplace service.
//!
//! Configuration is read from a TOML file. `${VAR}` and `${VAR:-default}`
//! placeholders are replaced with environment variables before parsing, so
//! secrets such as the wallet key can stay out of the file. The parsed
//! configuration is validated before it is handed out.

use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use voicedeck_types::{networks::deserialize_networks, Address, NetworksConfig, SecretString};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The full error embeds the whole input; keep only the message
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Settings of this marketplace instance.
	pub marketplace: MarketplaceConfig,
	/// Chains the marketplace trades on.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Wallet signing approvals and purchases.
	pub wallet: WalletConfig,
	/// Chain client implementations.
	pub delivery: DeliveryConfig,
	/// Marketplace client implementations.
	pub exchange: ExchangeConfig,
	/// Contribution recorder implementations.
	pub contributions: ContributionsConfig,
	/// HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Settings of this marketplace instance.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
	/// Identifier used in logs.
	pub id: String,
}

/// Wallet configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
	/// Hex encoded secp256k1 private key.
	pub private_key: SecretString,
}

/// Configuration for chain client implementations.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
	/// Implementation name to its raw TOML table. Each table lists the
	/// `network_ids` it serves.
	pub implementations: HashMap<String, toml::Value>,
	/// Confirmations required before a receipt is reported.
	#[serde(default = "default_confirmations")]
	pub min_confirmations: u64,
}

fn default_confirmations() -> u64 {
	1
}

/// Configuration for marketplace client implementations.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for contribution recorder implementations.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributionsConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Replaces `${VAR_NAME}` and `${VAR_NAME:-default}` with environment values.
///
/// Input is capped at 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut resolved = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(value) => value,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		resolved.push_str(&input[last_end..full_match.start()]);
		resolved.push_str(&value);
		last_end = full_match.end();
	}
	resolved.push_str(&input[last_end..]);

	Ok(resolved)
}

impl Config {
	/// Loads and validates a configuration file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path.as_ref()).await?;
		content.parse()
	}

	/// Checks cross-section consistency:
	/// - marketplace id and wallet key are set
	/// - every network has an RPC URL and an exchange address
	/// - every network is served by exactly one delivery implementation
	/// - `primary` names an existing implementation for exchange and contributions
	fn validate(&self) -> Result<(), ConfigError> {
		if self.marketplace.id.is_empty() {
			return Err(ConfigError::Validation("Marketplace ID cannot be empty".into()));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (chain_id, network) in &self.networks {
			if network.rpc_url.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have rpc_url",
					chain_id
				)));
			}
			if network.exchange_address == Address::ZERO {
				return Err(ConfigError::Validation(format!(
					"Network {} must have a non-zero exchange_address",
					chain_id
				)));
			}
		}

		if self.wallet.private_key.is_empty() {
			return Err(ConfigError::Validation(
				"Wallet private_key cannot be empty".into(),
			));
		}

		if self.delivery.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one delivery implementation required".into(),
			));
		}
		if self.delivery.min_confirmations == 0 {
			return Err(ConfigError::Validation(
				"min_confirmations must be at least 1".into(),
			));
		}
		if self.delivery.min_confirmations > 100 {
			return Err(ConfigError::Validation(
				"min_confirmations cannot exceed 100".into(),
			));
		}
		self.validate_delivery_coverage()?;

		validate_primary("exchange", &self.exchange.primary, &self.exchange.implementations)?;
		validate_primary(
			"contributions",
			&self.contributions.primary,
			&self.contributions.implementations,
		)?;

		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
		}

		Ok(())
	}

	/// Every configured network needs exactly one chain client, and chain
	/// clients may only reference configured networks.
	fn validate_delivery_coverage(&self) -> Result<(), ConfigError> {
		let mut coverage: HashMap<u64, String> = HashMap::new();

		for (impl_name, impl_config) in &self.delivery.implementations {
			let network_ids = impl_config
				.get("network_ids")
				.and_then(|v| v.as_array())
				.ok_or_else(|| {
					ConfigError::Validation(format!(
						"Delivery implementation '{}' missing 'network_ids' field",
						impl_name
					))
				})?;

			for value in network_ids {
				let network_id = value.as_integer().ok_or_else(|| {
					ConfigError::Validation(format!(
						"Invalid network_id in delivery '{}'",
						impl_name
					))
				})? as u64;

				if !self.networks.contains_key(&network_id) {
					return Err(ConfigError::Validation(format!(
						"Delivery '{}' references network {} which doesn't exist in networks config",
						impl_name, network_id
					)));
				}

				if let Some(existing) = coverage.insert(network_id, impl_name.clone()) {
					return Err(ConfigError::Validation(format!(
						"Network {} is served by both '{}' and '{}'",
						network_id, existing, impl_name
					)));
				}
			}
		}

		let covered: HashSet<&u64> = coverage.keys().collect();
		if let Some(uncovered) = self.networks.keys().find(|id| !covered.contains(id)) {
			return Err(ConfigError::Validation(format!(
				"Network {} has no delivery implementation",
				uncovered
			)));
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses a configuration from a TOML string, resolving environment variables
/// and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const BASE_CONFIG: &str = r#"
[marketplace]
id = "voicedeck-test"

[networks.11155111]
rpc_url = "http://localhost:8545"
exchange_address = "0xB1991E985197d14669852Be8e53ee95A1f4621c0"
[[networks.11155111.currencies]]
address = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"
symbol = "USDC"
decimals = 6

[wallet]
private_key = "${VOICEDECK_TEST_KEY:-0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80}"

[delivery]
[delivery.implementations.evm_alloy]
network_ids = [11155111]

[exchange]
primary = "hypercerts"
[exchange.implementations.hypercerts]

[contributions]
primary = "http"
[contributions.implementations.http]
endpoint = "http://localhost:3000/api/contributions"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("VOICEDECK_TEST_HOST", "localhost");
		std::env::set_var("VOICEDECK_TEST_PORT", "8545");

		let result = resolve_env_vars("url = \"http://${VOICEDECK_TEST_HOST}:${VOICEDECK_TEST_PORT}\"")
			.unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("VOICEDECK_TEST_HOST");
		std::env::remove_var("VOICEDECK_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let result = resolve_env_vars("value = \"${VOICEDECK_MISSING:-fallback}\"").unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${VOICEDECK_MISSING_NO_DEFAULT}\"");
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("VOICEDECK_MISSING_NO_DEFAULT"));
	}

	#[test]
	fn test_parse_base_config() {
		let config: Config = BASE_CONFIG.parse().unwrap();

		assert_eq!(config.marketplace.id, "voicedeck-test");
		assert_eq!(config.delivery.min_confirmations, 1);
		let network = &config.networks[&11155111];
		assert_eq!(network.currencies[0].symbol, "USDC");
		assert!(network.currency(&network.currencies[0].address).is_some());
		assert!(config.api.is_none());
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let config_str = BASE_CONFIG.replace("primary = \"http\"", "primary = \"grpc\"");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary contributions 'grpc'"));
	}

	#[test]
	fn test_delivery_must_cover_known_networks() {
		let config_str = BASE_CONFIG.replace("network_ids = [11155111]", "network_ids = [10]");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("references network 10"));
	}

	#[test]
	fn test_uncovered_network_rejected() {
		let config_str = format!(
			"{}\n{}",
			BASE_CONFIG,
			r#"
[networks.10]
rpc_url = "http://localhost:9545"
exchange_address = "0xB1991E985197d14669852Be8e53ee95A1f4621c0"
"#
		);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Network 10 has no delivery implementation"));
	}

	#[test]
	fn test_zero_confirmations_rejected() {
		let config_str = BASE_CONFIG.replace("[delivery]", "[delivery]\nmin_confirmations = 0");
		assert!(config_str.parse::<Config>().is_err());
	}

	#[tokio::test]
	async fn test_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			"{}\n[api]\nenabled = true\nport = 4000\n",
			BASE_CONFIG
		)
		.unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		let api = config.api.unwrap();
		assert!(api.enabled);
		assert_eq!(api.port, 4000);
		assert_eq!(api.host, "127.0.0.1");
	}

	#[tokio::test]
	async fn test_from_missing_file() {
		let result = Config::from_file("/nonexistent/voicedeck.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}
}
