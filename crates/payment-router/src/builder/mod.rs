//! Construction of a ready-to-use route assembler from configuration.
//!
//! The oracle backend is created through a named factory, the proxy registry
//! from the `[networks]` section, and the encoder is supplied by the caller.

use crate::assembler::PaymentRouteAssembler;
use crate::registry::NetworkProxyRegistry;
use crate::PaymentEncoder;
use payment_config::Config;
use payment_oracle::{OracleError, OracleInterface, OracleService};
use payment_types::NetworksConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while building a router.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions keyed by implementation name.
pub struct RouterFactories<OF> {
	pub oracle_factories: HashMap<String, OF>,
}

impl RouterFactories<payment_oracle::OracleFactory> {
	/// Factories for every oracle backend shipped with this workspace.
	pub fn builtin() -> Self {
		Self {
			oracle_factories: payment_oracle::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}
}

/// Builder for a [`PaymentRouteAssembler`].
pub struct RouterBuilder {
	config: Config,
	encoder: Option<Arc<dyn PaymentEncoder>>,
}

impl RouterBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			encoder: None,
		}
	}

	/// Sets the encoder producing approve and pay payloads.
	pub fn with_encoder(mut self, encoder: Arc<dyn PaymentEncoder>) -> Self {
		self.encoder = Some(encoder);
		self
	}

	/// Builds the assembler.
	///
	/// Only the primary oracle implementation is instantiated; a configured
	/// implementation without a matching factory is skipped.
	pub fn build<OF>(self, factories: RouterFactories<OF>) -> Result<PaymentRouteAssembler, BuilderError>
	where
		OF: Fn(&toml::Value, &NetworksConfig) -> Result<Box<dyn OracleInterface>, OracleError>,
	{
		let encoder = self
			.encoder
			.ok_or_else(|| BuilderError::MissingComponent("payment encoder".into()))?;

		let primary = &self.config.oracle.primary;
		let oracle_config = self.config.oracle.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary oracle '{}' not found in implementations",
				primary
			))
		})?;
		let factory = factories.oracle_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("oracle implementation '{}'", primary))
		})?;

		let backend = match factory(oracle_config, &self.config.networks) {
			Ok(backend) => {
				tracing::info!(component = "oracle", implementation = %primary, "Loaded");
				backend
			},
			Err(e) => {
				tracing::error!(
					component = "oracle",
					implementation = %primary,
					error = %e,
					"Failed to create oracle implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create oracle implementation '{}': {}",
					primary, e
				)));
			},
		};

		let oracle = Arc::new(OracleService::new(
			backend,
			self.config.networks.clone(),
			Duration::from_secs(self.config.oracle.query_timeout_seconds),
		));
		let registry = Arc::new(NetworkProxyRegistry::new(self.config.networks));

		tracing::info!(
			router_id = %self.config.router.id,
			oracle = %primary,
			"Payment router ready"
		);

		Ok(PaymentRouteAssembler::new(
			oracle.clone(),
			oracle,
			encoder,
			registry,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{MockPaymentEncoder, RoutingError};
	use payment_config::testing::SAMPLE_CONFIG;
	use payment_types::{Address, Bytes, CurrencyKind, PaymentRequest, RequestStatus, U256};

	const PAYER: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

	fn seeded_config() -> Config {
		let seeded = format!(
			"{}\n[[oracle.implementations.memory.balances]]\nnetwork_id = 5\nowner = \"{}\"\namount = \"500\"\n",
			SAMPLE_CONFIG, PAYER
		);
		seeded.parse().unwrap()
	}

	fn encoder() -> Arc<dyn PaymentEncoder> {
		let mut encoder = MockPaymentEncoder::new();
		encoder
			.expect_encode_pay_eth_proxy()
			.returning(|_| Ok(Bytes::from_static(b"pay-eth")));
		Arc::new(encoder)
	}

	fn native_request(amount: u64) -> PaymentRequest {
		PaymentRequest {
			request_id: "0a0b0c0d0e0f".to_string(),
			currency_kind: CurrencyKind::NativeEth,
			token_contract_address: None,
			network_id: Some(5),
			payer_address: Some(PAYER.parse().unwrap()),
			payee_address: None,
			payment_address: None,
			amount_to_pay: U256::from(amount),
			status: RequestStatus::Open,
		}
	}

	#[tokio::test]
	async fn test_builds_with_memory_oracle() {
		let assembler = RouterBuilder::new(seeded_config())
			.with_encoder(encoder())
			.build(RouterFactories::builtin())
			.unwrap();
		let payer: Address = PAYER.parse().unwrap();

		let batch = assembler
			.assemble(&native_request(500), &payer)
			.await
			.unwrap();
		assert_eq!(batch.pay_step().value, U256::from(500));

		let result = assembler.assemble(&native_request(501), &payer).await;
		assert!(matches!(result, Err(RoutingError::InsufficientFunds)));
	}

	#[test]
	fn test_encoder_required() {
		let result = RouterBuilder::new(seeded_config()).build(RouterFactories::builtin());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_missing_factory() {
		let factories: RouterFactories<payment_oracle::OracleFactory> = RouterFactories {
			oracle_factories: HashMap::new(),
		};
		let result = RouterBuilder::new(seeded_config())
			.with_encoder(encoder())
			.build(factories);
		assert!(matches!(result, Err(BuilderError::MissingComponent(msg)) if msg.contains("memory")));
	}

	#[test]
	fn test_factory_failure_reported() {
		let input = SAMPLE_CONFIG
			.replace("primary = \"memory\"", "primary = \"evm_alloy\"")
			.replace(
				"[oracle.implementations.memory]",
				"[oracle.implementations.evm_alloy]\nnetwork_ids = [10]",
			);
		let config: Config = input.parse().unwrap();

		let result = RouterBuilder::new(config)
			.with_encoder(encoder())
			.build(RouterFactories::builtin());
		assert!(
			matches!(result, Err(BuilderError::Config(msg)) if msg.contains("Network 10 not found"))
		);
	}
}
