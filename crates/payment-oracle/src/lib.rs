//! Balance and allowance oracle for payment requests.
//!
//! This crate answers the two read-only questions routing asks before a
//! payment: does the payer hold enough funds, and has the payer granted the
//! payment proxy a large enough ERC20 allowance. Chain reads are delegated to
//! a pluggable backend implementing [`OracleInterface`]; the
//! [`OracleService`] turns a payment request into the right reads and
//! compares the results with the amount to pay.

use alloy_primitives::U256;
use async_trait::async_trait;
use payment_types::{
	truncate_id, Address, ConfigSchema, CurrencyKind, ImplementationRegistry, NetworksConfig,
	PaymentRequest, ProxyKind,
};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod memory;
}

/// Errors that can occur during oracle queries.
#[derive(Debug, Error)]
pub enum OracleError {
	/// Communication with the chain failed.
	#[error("Network error: {0}")]
	Network(String),
	/// The backend has no connection for the requested network.
	#[error("No provider configured for network {0}")]
	NoProviderAvailable(u64),
	/// The query did not complete within the configured bound.
	#[error("Query timed out after {0} seconds")]
	Timeout(u64),
	/// The request's currency cannot be checked on chain.
	#[error("Unsupported currency for on-chain checks: {0}")]
	Unsupported(String),
	/// The request lacks data the query needs.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	/// The backend configuration is invalid.
	#[error("Invalid configuration: {0}")]
	Configuration(String),
}

/// Chain reads needed to evaluate funds and allowances.
///
/// Implementations may serve several networks; the network is passed with
/// every call.
#[async_trait]
pub trait OracleInterface: Send + Sync {
	/// Returns the schema this implementation validates its configuration with.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Returns the balance of `owner`.
	///
	/// `token = None` reads the native balance, otherwise the ERC20 balance
	/// held in the given token contract.
	async fn get_balance(
		&self,
		network_id: u64,
		owner: &Address,
		token: Option<&Address>,
	) -> Result<U256, OracleError>;

	/// Returns the ERC20 allowance `owner` granted to `spender`.
	async fn get_allowance(
		&self,
		network_id: u64,
		owner: &Address,
		spender: &Address,
		token: &Address,
	) -> Result<U256, OracleError>;
}

/// Factory signature every oracle implementation provides.
pub type OracleFactory =
	fn(&toml::Value, &NetworksConfig) -> Result<Box<dyn OracleInterface>, OracleError>;

/// Registry for oracle implementations.
pub trait OracleRegistry: ImplementationRegistry<Factory = OracleFactory> {}

/// Returns `(name, factory)` for every built-in oracle implementation.
pub fn get_all_implementations() -> Vec<(&'static str, OracleFactory)> {
	use implementations::{evm::alloy, memory};

	vec![
		(alloy::Registry::NAME, alloy::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Evaluates payment requests against an oracle backend.
pub struct OracleService {
	implementation: Box<dyn OracleInterface>,
	/// Used to find the ERC20 proxy a payer must approve.
	networks: NetworksConfig,
	query_timeout: Duration,
}

impl OracleService {
	pub fn new(
		implementation: Box<dyn OracleInterface>,
		networks: NetworksConfig,
		query_timeout: Duration,
	) -> Self {
		Self {
			implementation,
			networks,
			query_timeout,
		}
	}

	/// Returns the payer's balance in the request's currency.
	pub async fn balance_of(
		&self,
		request: &PaymentRequest,
		owner: &Address,
	) -> Result<U256, OracleError> {
		let network_id = required_network(request)?;
		let token = match &request.currency_kind {
			CurrencyKind::Erc20 => Some(required_token(request)?),
			CurrencyKind::NativeEth => None,
			other => return Err(OracleError::Unsupported(other.to_string())),
		};

		self.bounded(self.implementation.get_balance(network_id, owner, token))
			.await
	}

	/// Returns the ERC20 allowance the payer granted to the network's ERC20 proxy.
	pub async fn allowance_of(
		&self,
		request: &PaymentRequest,
		owner: &Address,
	) -> Result<U256, OracleError> {
		if request.currency_kind != CurrencyKind::Erc20 {
			return Err(OracleError::Unsupported(request.currency_kind.to_string()));
		}
		let network_id = required_network(request)?;
		let token = required_token(request)?;
		let spender = self
			.networks
			.get(&network_id)
			.map(|network| network.proxy_address(ProxyKind::Erc20Proxy))
			.ok_or(OracleError::NoProviderAvailable(network_id))?;

		self.bounded(
			self.implementation
				.get_allowance(network_id, owner, spender, token),
		)
		.await
	}

	/// Whether `payer` holds at least the amount to pay.
	pub async fn has_sufficient_funds(
		&self,
		request: &PaymentRequest,
		payer: &Address,
	) -> Result<bool, OracleError> {
		let balance = self.balance_of(request, payer).await?;
		let sufficient = balance >= request.amount_to_pay;

		tracing::debug!(
			request_id = %truncate_id(&request.request_id),
			payer = %payer,
			balance = %balance,
			amount = %request.amount_to_pay,
			sufficient,
			"Checked funds"
		);
		Ok(sufficient)
	}

	/// Whether `payer` has approved the payment proxy for at least the amount to pay.
	///
	/// Native currency payments need no approval and always report true.
	pub async fn has_sufficient_approval(
		&self,
		request: &PaymentRequest,
		payer: &Address,
	) -> Result<bool, OracleError> {
		if request.currency_kind == CurrencyKind::NativeEth {
			return Ok(true);
		}

		let allowance = self.allowance_of(request, payer).await?;
		let sufficient = allowance >= request.amount_to_pay;

		tracing::debug!(
			request_id = %truncate_id(&request.request_id),
			payer = %payer,
			allowance = %allowance,
			amount = %request.amount_to_pay,
			sufficient,
			"Checked allowance"
		);
		Ok(sufficient)
	}

	async fn bounded<T>(
		&self,
		query: impl Future<Output = Result<T, OracleError>>,
	) -> Result<T, OracleError> {
		tokio::time::timeout(self.query_timeout, query)
			.await
			.map_err(|_| OracleError::Timeout(self.query_timeout.as_secs()))?
	}
}

fn required_network(request: &PaymentRequest) -> Result<u64, OracleError> {
	request
		.network_id
		.ok_or_else(|| OracleError::InvalidRequest("missing network id".to_string()))
}

fn required_token(request: &PaymentRequest) -> Result<&Address, OracleError> {
	request
		.token_contract_address
		.as_ref()
		.ok_or_else(|| OracleError::InvalidRequest("missing token contract address".to_string()))
}
