//! In-memory oracle backend.
//!
//! Balances and allowances are held in maps and can be seeded from
//! configuration or set at runtime. Unknown entries read as zero. Intended for
//! tests and local development.

use crate::{OracleError, OracleInterface};
use alloy_primitives::U256;
use async_trait::async_trait;
use payment_types::{
	Address, ConfigSchema, Field, FieldType, ImplementationRegistry, NetworksConfig, Schema,
	ValidationError,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

type BalanceKey = (u64, Address, Option<Address>);
type AllowanceKey = (u64, Address, Address, Address);

/// Oracle backed by in-memory maps.
#[derive(Default)]
pub struct MemoryOracle {
	balances: RwLock<HashMap<BalanceKey, U256>>,
	allowances: RwLock<HashMap<AllowanceKey, U256>>,
}

impl MemoryOracle {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets a native (`token = None`) or ERC20 balance.
	pub async fn set_balance(
		&self,
		network_id: u64,
		owner: &Address,
		token: Option<&Address>,
		amount: U256,
	) {
		self.balances
			.write()
			.await
			.insert((network_id, owner.clone(), token.cloned()), amount);
	}

	/// Sets the allowance `owner` granted to `spender` on `token`.
	pub async fn set_allowance(
		&self,
		network_id: u64,
		owner: &Address,
		spender: &Address,
		token: &Address,
		amount: U256,
	) {
		self.allowances.write().await.insert(
			(network_id, owner.clone(), spender.clone(), token.clone()),
			amount,
		);
	}
}

#[async_trait]
impl OracleInterface for MemoryOracle {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryOracleSchema)
	}

	async fn get_balance(
		&self,
		network_id: u64,
		owner: &Address,
		token: Option<&Address>,
	) -> Result<U256, OracleError> {
		let balances = self.balances.read().await;
		Ok(balances
			.get(&(network_id, owner.clone(), token.cloned()))
			.copied()
			.unwrap_or(U256::ZERO))
	}

	async fn get_allowance(
		&self,
		network_id: u64,
		owner: &Address,
		spender: &Address,
		token: &Address,
	) -> Result<U256, OracleError> {
		let allowances = self.allowances.read().await;
		Ok(allowances
			.get(&(network_id, owner.clone(), spender.clone(), token.clone()))
			.copied()
			.unwrap_or(U256::ZERO))
	}
}

/// Configuration schema for the in-memory oracle.
///
/// Both seed lists are optional:
///
/// ```toml
/// [[oracle.implementations.memory.balances]]
/// network_id = 1
/// owner = "0x..."
/// token = "0x..."      # omit for the native balance
/// amount = "1000"
///
/// [[oracle.implementations.memory.allowances]]
/// network_id = 1
/// owner = "0x..."
/// spender = "0x..."
/// token = "0x..."
/// amount = "1000"
/// ```
pub struct MemoryOracleSchema;

fn seed_entry(required: &[&str], optional: &[&str]) -> FieldType {
	let network_id = Field::new(
		"network_id",
		FieldType::Integer {
			min: Some(1),
			max: None,
		},
	);
	let mut required_fields = vec![network_id];
	required_fields.extend(required.iter().map(|name| Field::new(*name, FieldType::String)));
	let optional_fields = optional
		.iter()
		.map(|name| Field::new(*name, FieldType::String))
		.collect();

	FieldType::Array(Box::new(FieldType::Table(Schema::new(
		required_fields,
		optional_fields,
	))))
}

impl ConfigSchema for MemoryOracleSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("balances", seed_entry(&["owner", "amount"], &["token"])),
				Field::new(
					"allowances",
					seed_entry(&["owner", "spender", "token", "amount"], &[]),
				),
			],
		);
		schema.validate(config)
	}
}

fn parse_address(entry: &toml::Value, field: &str) -> Result<Address, OracleError> {
	entry
		.get(field)
		.and_then(|v| v.as_str())
		.ok_or_else(|| OracleError::Configuration(format!("missing '{}'", field)))?
		.parse()
		.map_err(|e| OracleError::Configuration(format!("invalid '{}': {}", field, e)))
}

fn parse_seed(entry: &toml::Value) -> Result<(u64, Address, U256), OracleError> {
	let network_id = entry
		.get("network_id")
		.and_then(|v| v.as_integer())
		.ok_or_else(|| OracleError::Configuration("missing 'network_id'".to_string()))?
		as u64;
	let owner = parse_address(entry, "owner")?;
	let amount = entry
		.get("amount")
		.and_then(|v| v.as_str())
		.ok_or_else(|| OracleError::Configuration("missing 'amount'".to_string()))?;
	let amount = amount
		.parse::<U256>()
		.map_err(|e| OracleError::Configuration(format!("invalid amount '{}': {}", amount, e)))?;

	Ok((network_id, owner, amount))
}

/// Creates a memory oracle, seeding it from configuration.
pub fn create_oracle(
	config: &toml::Value,
	_networks: &NetworksConfig,
) -> Result<Box<dyn OracleInterface>, OracleError> {
	MemoryOracleSchema
		.validate(config)
		.map_err(|e| OracleError::Configuration(e.to_string()))?;

	let mut balances = HashMap::new();
	let mut allowances = HashMap::new();

	let seeds = |name: &str| {
		config
			.get(name)
			.and_then(|v| v.as_array())
			.cloned()
			.unwrap_or_default()
	};

	for entry in seeds("balances") {
		let (network_id, owner, amount) = parse_seed(&entry)?;
		let token = match entry.get("token") {
			Some(_) => Some(parse_address(&entry, "token")?),
			None => None,
		};
		balances.insert((network_id, owner, token), amount);
	}

	for entry in seeds("allowances") {
		let (network_id, owner, amount) = parse_seed(&entry)?;
		let spender = parse_address(&entry, "spender")?;
		let token = parse_address(&entry, "token")?;
		allowances.insert((network_id, owner, spender, token), amount);
	}

	tracing::debug!(
		balances = balances.len(),
		allowances = allowances.len(),
		"Seeded memory oracle"
	);

	Ok(Box::new(MemoryOracle {
		balances: RwLock::new(balances),
		allowances: RwLock::new(allowances),
	}))
}

/// Registry for the in-memory oracle.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::OracleFactory;

	fn factory() -> Self::Factory {
		create_oracle
	}
}

impl crate::OracleRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	const OWNER: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
	const SPENDER: &str = "0x370DE27fdb7D1Ff1e1BaA7D11c5820a324Cf623C";
	const TOKEN: &str = "0x9FBDa871d559710256a2502A2517b794B482Db40";

	#[tokio::test]
	async fn test_unknown_entries_read_as_zero() {
		let oracle = MemoryOracle::new();
		let owner: Address = OWNER.parse().unwrap();

		assert_eq!(oracle.get_balance(1, &owner, None).await.unwrap(), U256::ZERO);
	}

	#[tokio::test]
	async fn test_seeded_from_config() {
		let config: toml::Value = toml::from_str(&format!(
			r#"
[[balances]]
network_id = 1
owner = "{OWNER}"
amount = "500"

[[balances]]
network_id = 1
owner = "{OWNER}"
token = "{TOKEN}"
amount = "100"

[[allowances]]
network_id = 1
owner = "{OWNER}"
spender = "{SPENDER}"
token = "{TOKEN}"
amount = "100"
"#
		))
		.unwrap();

		let oracle = create_oracle(&config, &NetworksConfig::new()).unwrap();
		let owner: Address = OWNER.to_lowercase().parse().unwrap();
		let spender: Address = SPENDER.parse().unwrap();
		let token: Address = TOKEN.parse().unwrap();

		assert_eq!(
			oracle.get_balance(1, &owner, None).await.unwrap(),
			U256::from(500)
		);
		assert_eq!(
			oracle.get_balance(1, &owner, Some(&token)).await.unwrap(),
			U256::from(100)
		);
		assert_eq!(
			oracle
				.get_allowance(1, &owner, &spender, &token)
				.await
				.unwrap(),
			U256::from(100)
		);
		assert_eq!(
			oracle.get_balance(5, &owner, None).await.unwrap(),
			U256::ZERO
		);
	}

	#[test]
	fn test_seed_schema_rejects_missing_amount() {
		let config: toml::Value = toml::from_str(&format!(
			"[[balances]]\nnetwork_id = 1\nowner = \"{OWNER}\"\n"
		))
		.unwrap();

		let result = create_oracle(&config, &NetworksConfig::new());
		assert!(matches!(result, Err(OracleError::Configuration(msg)) if msg.contains("balances")));
	}

	#[test]
	fn test_empty_config_accepted() {
		let config = toml::Value::Table(toml::Table::new());
		assert!(create_oracle(&config, &NetworksConfig::new()).is_ok());
	}
}
