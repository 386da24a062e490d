//! Network configuration for payment routing.
//!
//! Each supported chain id maps to an RPC endpoint and the addresses of the
//! deployed payment proxy contracts.

use crate::Address;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The payment proxy contracts a request can be settled through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyKind {
	/// Proxy that pulls ERC20 tokens from the payer using an allowance.
	Erc20Proxy,
	/// Proxy that forwards attached native currency.
	EthProxy,
}

impl fmt::Display for ProxyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Erc20Proxy => f.write_str("erc20_proxy"),
			Self::EthProxy => f.write_str("eth_proxy"),
		}
	}
}

/// Configuration for a single network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// HTTP(S) JSON-RPC endpoint.
	pub rpc_url: String,
	pub erc20_proxy_address: Address,
	pub eth_proxy_address: Address,
}

impl NetworkConfig {
	/// Returns the deployed address of the given proxy.
	pub fn proxy_address(&self, kind: ProxyKind) -> &Address {
		match kind {
			ProxyKind::Erc20Proxy => &self.erc20_proxy_address,
			ProxyKind::EthProxy => &self.eth_proxy_address,
		}
	}
}

/// Chain id to network configuration.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Deserializes networks keyed by chain id.
///
/// TOML table keys are always strings, so chain ids arrive as `"1"`, `"5"`
/// and are parsed into integers here.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let by_key: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;

	by_key
		.into_iter()
		.map(|(key, network)| {
			key.parse::<u64>()
				.map(|chain_id| (chain_id, network))
				.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Deserialize)]
	struct Wrapper {
		#[serde(deserialize_with = "deserialize_networks")]
		networks: NetworksConfig,
	}

	#[test]
	fn test_deserialize_string_chain_ids() {
		let input = r#"
[networks.5]
rpc_url = "http://localhost:8545"
erc20_proxy_address = "0x2C2B9C9a4a25e24B174f26114e8926a9f2128FE4"
eth_proxy_address = "0x9c6c7817e3679c4b3f9ef9486001eae5aaed25ff"
"#;
		let wrapper: Wrapper = toml::from_str(input).unwrap();
		let network = wrapper.networks.get(&5).unwrap();

		assert_eq!(
			network.proxy_address(ProxyKind::EthProxy).to_string(),
			"0x9c6c7817e3679c4b3f9ef9486001eae5aaed25ff"
		);
	}

	#[test]
	fn test_rejects_non_numeric_chain_id() {
		let input = r#"
[networks.mainnet]
rpc_url = "http://localhost:8545"
erc20_proxy_address = "0x2C2B9C9a4a25e24B174f26114e8926a9f2128FE4"
eth_proxy_address = "0x9c6c7817e3679c4b3f9ef9486001eae5aaed25ff"
"#;
		let result = toml::from_str::<Wrapper>(input);
		assert!(result.is_err());
	}
}
