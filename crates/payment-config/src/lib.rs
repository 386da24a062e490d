//! Configuration for the request payment router.
//!
//! Configuration is read from TOML. String values may reference environment
//! variables as `${VAR}` or `${VAR:-default}`, and a file may pull other files
//! in with `include = ["networks.toml"]`. Every top-level section must be
//! defined exactly once across all included files.

mod loader;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use payment_types::{networks::deserialize_networks, NetworksConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The full error embeds the whole input; the message alone is enough.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub router: RouterConfig,
	/// Networks keyed by chain id.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	pub oracle: OracleConfig,
}

/// Identity of this router instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
	/// Name used in log output.
	pub id: String,
}

/// Balance and allowance oracle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
	/// Name of the implementation used for queries.
	pub primary: String,
	/// Implementation name to its raw configuration table.
	pub implementations: HashMap<String, toml::Value>,
	/// Upper bound on a single balance or allowance read.
	#[serde(default = "default_query_timeout_seconds")]
	pub query_timeout_seconds: u64,
}

fn default_query_timeout_seconds() -> u64 {
	15
}

const MAX_QUERY_TIMEOUT_SECONDS: u64 = 300;

/// Substitutes `${VAR}` and `${VAR:-default}` references with environment values.
///
/// Inputs over 1MB are rejected before the regex runs.
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

		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)));
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
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("Invalid path: {}", path.display()))
		})?;

		let mut loader = loader::ConfigLoader::new(base_dir);
		let config = loader.load_config(file_name).await?;
		tracing::debug!(
			router_id = %config.router.id,
			networks = config.networks.len(),
			"Loaded configuration"
		);
		Ok(config)
	}

	/// Checks cross-field constraints serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.router.id.trim().is_empty() {
			return Err(ConfigError::Validation("Router ID cannot be empty".into()));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (chain_id, network) in &self.networks {
			if *chain_id == 0 {
				return Err(ConfigError::Validation("Chain id 0 is not valid".into()));
			}
			if network.rpc_url.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have an rpc_url",
					chain_id
				)));
			}
		}

		if self.oracle.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one oracle implementation must be configured".into(),
			));
		}
		if !self.oracle.implementations.contains_key(&self.oracle.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary oracle '{}' not found in implementations",
				self.oracle.primary
			)));
		}
		if self.oracle.query_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"Oracle query_timeout_seconds must be greater than 0".into(),
			));
		}
		if self.oracle.query_timeout_seconds > MAX_QUERY_TIMEOUT_SECONDS {
			return Err(ConfigError::Validation(format!(
				"Oracle query_timeout_seconds cannot exceed {}",
				MAX_QUERY_TIMEOUT_SECONDS
			)));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
