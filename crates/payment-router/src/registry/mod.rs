//! Resolution of payment proxy contract addresses.

use payment_types::{Address, NetworksConfig, ProxyKind};
use thiserror::Error;

/// Errors that can occur when resolving a proxy address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
	/// The request does not name a network.
	#[error("Request has no network id")]
	MissingNetworkId,
	/// No proxy deployment is known for the network.
	#[error("No {kind} deployment known for network {network_id}")]
	UnknownNetwork { kind: ProxyKind, network_id: u64 },
}

/// Maps a proxy kind and network to the deployed proxy contract.
#[cfg_attr(test, mockall::automock)]
pub trait ProxyRegistry: Send + Sync {
	fn resolve_address(
		&self,
		kind: ProxyKind,
		network_id: Option<u64>,
	) -> Result<Address, RegistryError>;
}

/// Proxy registry backed by the `[networks]` configuration section.
pub struct NetworkProxyRegistry {
	networks: NetworksConfig,
}

impl NetworkProxyRegistry {
	pub fn new(networks: NetworksConfig) -> Self {
		Self { networks }
	}
}

impl ProxyRegistry for NetworkProxyRegistry {
	fn resolve_address(
		&self,
		kind: ProxyKind,
		network_id: Option<u64>,
	) -> Result<Address, RegistryError> {
		let network_id = network_id.ok_or(RegistryError::MissingNetworkId)?;
		self.networks
			.get(&network_id)
			.map(|network| network.proxy_address(kind).clone())
			.ok_or(RegistryError::UnknownNetwork { kind, network_id })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use payment_config::{testing::SAMPLE_CONFIG, Config};

	fn registry() -> NetworkProxyRegistry {
		let config: Config = SAMPLE_CONFIG.parse().unwrap();
		NetworkProxyRegistry::new(config.networks)
	}

	#[test]
	fn test_resolves_each_proxy_kind() {
		let registry = registry();

		let erc20 = registry
			.resolve_address(ProxyKind::Erc20Proxy, Some(1))
			.unwrap();
		assert_eq!(
			erc20,
			"0x370de27fdb7d1ff1e1baa7d11c5820a324cf623c".parse::<Address>().unwrap()
		);

		let eth = registry.resolve_address(ProxyKind::EthProxy, Some(5)).unwrap();
		assert_eq!(
			eth,
			"0x9C6C7817E3679C4B3F9EF9486001EAE5AAED25FF".parse::<Address>().unwrap()
		);
	}

	#[test]
	fn test_missing_network_id() {
		assert_eq!(
			registry().resolve_address(ProxyKind::EthProxy, None),
			Err(RegistryError::MissingNetworkId)
		);
	}

	#[test]
	fn test_unknown_network() {
		let err = registry()
			.resolve_address(ProxyKind::Erc20Proxy, Some(137))
			.unwrap_err();
		assert_eq!(
			err,
			RegistryError::UnknownNetwork {
				kind: ProxyKind::Erc20Proxy,
				network_id: 137
			}
		);
		assert_eq!(
			err.to_string(),
			"No erc20_proxy deployment known for network 137"
		);
	}
}
