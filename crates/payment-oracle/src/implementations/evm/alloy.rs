//! JSON-RPC oracle backend for EVM networks.
//!
//! Reads native balances with `eth_getBalance` and ERC20 balances and
//! allowances with `eth_call` against the token contract. Supports several
//! networks with a single instance.

use crate::{OracleError, OracleInterface};
use alloy_primitives::{Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use payment_types::{
	Address, ConfigSchema, Field, FieldType, ImplementationRegistry, NetworksConfig, Schema,
	ValidationError,
};
use std::collections::HashMap;
use std::sync::Arc;

sol! {
	/// The subset of ERC20 read by the oracle.
	interface IERC20 {
		function balanceOf(address account) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
	}
}

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Alloy-based oracle backend.
pub struct AlloyOracle {
	/// One HTTP provider per configured network.
	providers: HashMap<u64, HttpProvider>,
}

impl AlloyOracle {
	/// Connects to each of `network_ids` using the RPC URL from `networks`.
	pub fn new(network_ids: &[u64], networks: &NetworksConfig) -> Result<Self, OracleError> {
		if network_ids.is_empty() {
			return Err(OracleError::Configuration(
				"At least one network_id must be specified".to_string(),
			));
		}

		let mut providers = HashMap::new();
		for network_id in network_ids {
			let network = networks.get(network_id).ok_or_else(|| {
				OracleError::Configuration(format!(
					"Network {} not found in configuration",
					network_id
				))
			})?;

			let url: reqwest::Url = network.rpc_url.parse().map_err(|e| {
				OracleError::Configuration(format!(
					"Invalid RPC URL for network {}: {}",
					network_id, e
				))
			})?;

			let provider = ProviderBuilder::new().on_http(url);
			providers.insert(*network_id, Arc::new(provider) as HttpProvider);
		}

		Ok(Self { providers })
	}

	fn get_provider(&self, network_id: u64) -> Result<&HttpProvider, OracleError> {
		self.providers
			.get(&network_id)
			.ok_or(OracleError::NoProviderAvailable(network_id))
	}

	/// Runs a read-only call and decodes the leading uint256 word of the result.
	async fn call_uint(
		&self,
		network_id: u64,
		contract: &Address,
		call_data: Vec<u8>,
		method: &str,
	) -> Result<U256, OracleError> {
		let provider = self.get_provider(network_id)?;
		let to = contract
			.to_alloy()
			.map_err(|e| OracleError::InvalidRequest(e.to_string()))?;

		let request = TransactionRequest::default()
			.to(to)
			.input(Bytes::from(call_data).into());

		let result = provider
			.call(&request)
			.await
			.map_err(|e| OracleError::Network(format!("Failed to call {}: {}", method, e)))?;

		if result.len() < 32 {
			return Err(OracleError::Network(format!("Invalid {} response", method)));
		}

		Ok(U256::from_be_slice(&result[..32]))
	}
}

/// Configuration schema for the alloy oracle.
pub struct AlloyOracleSchema;

impl AlloyOracleSchema {
	/// Validates a configuration table before an instance exists.
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		Self.validate(config)
	}
}

impl ConfigSchema for AlloyOracleSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new(
				"network_ids",
				FieldType::Array(Box::new(FieldType::Integer {
					min: Some(1),
					max: None,
				})),
			)
			.with_validator(|value| match value.as_array() {
				Some(arr) if arr.is_empty() => Err("network_ids cannot be empty".to_string()),
				Some(_) => Ok(()),
				None => Err("network_ids must be an array".to_string()),
			})],
			vec![],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl OracleInterface for AlloyOracle {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyOracleSchema)
	}

	async fn get_balance(
		&self,
		network_id: u64,
		owner: &Address,
		token: Option<&Address>,
	) -> Result<U256, OracleError> {
		let owner_addr = owner
			.to_alloy()
			.map_err(|e| OracleError::InvalidRequest(e.to_string()))?;

		match token {
			None => {
				let provider = self.get_provider(network_id)?;
				let balance = provider
					.get_balance(owner_addr)
					.await
					.map_err(|e| OracleError::Network(format!("Failed to get balance: {}", e)))?;

				tracing::trace!(network_id, owner = %owner, %balance, "Read native balance");
				Ok(balance)
			},
			Some(token) => {
				let call_data = IERC20::balanceOfCall {
					account: owner_addr,
				}
				.abi_encode();

				let balance = self
					.call_uint(network_id, token, call_data, "balanceOf")
					.await?;

				tracing::trace!(network_id, owner = %owner, token = %token, %balance, "Read token balance");
				Ok(balance)
			},
		}
	}

	async fn get_allowance(
		&self,
		network_id: u64,
		owner: &Address,
		spender: &Address,
		token: &Address,
	) -> Result<U256, OracleError> {
		let owner_addr = owner
			.to_alloy()
			.map_err(|e| OracleError::InvalidRequest(e.to_string()))?;
		let spender_addr = spender
			.to_alloy()
			.map_err(|e| OracleError::InvalidRequest(e.to_string()))?;

		let call_data = IERC20::allowanceCall {
			owner: owner_addr,
			spender: spender_addr,
		}
		.abi_encode();

		let allowance = self
			.call_uint(network_id, token, call_data, "allowance")
			.await?;

		tracing::trace!(
			network_id,
			owner = %owner,
			spender = %spender,
			token = %token,
			%allowance,
			"Read allowance"
		);
		Ok(allowance)
	}
}

/// Creates an alloy oracle from configuration.
///
/// Configuration parameters:
/// - `network_ids` (required): networks to connect to; each must appear in `[networks]`
pub fn create_oracle(
	config: &toml::Value,
	networks: &NetworksConfig,
) -> Result<Box<dyn OracleInterface>, OracleError> {
	AlloyOracleSchema::validate_config(config)
		.map_err(|e| OracleError::Configuration(e.to_string()))?;

	let network_ids = config
		.get("network_ids")
		.and_then(|v| v.as_array())
		.map(|arr| {
			arr.iter()
				.filter_map(|v| v.as_integer().map(|i| i as u64))
				.collect::<Vec<_>>()
		})
		.ok_or_else(|| OracleError::Configuration("network_ids is required".to_string()))?;

	let oracle = AlloyOracle::new(&network_ids, networks)?;
	tracing::debug!(networks = ?network_ids, "Connected alloy oracle");

	Ok(Box::new(oracle))
}

/// Registry for the alloy oracle.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = crate::OracleFactory;

	fn factory() -> Self::Factory {
		create_oracle
	}
}

impl crate::OracleRegistry for Registry {}
