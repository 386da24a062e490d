//! Payment routing for request payments.
//!
//! Given a parsed payment request and the payer's address, the router decides
//! which on-chain transactions settle the request and in what order, or fails
//! with a typed reason. Everything the decision depends on is reached through
//! the collaborator traits defined here, so the decision itself stays free of
//! network and encoding concerns.

use async_trait::async_trait;
use payment_oracle::{OracleError, OracleService};
use payment_types::{Address, Bytes, PaymentRequest};
use thiserror::Error;

pub mod assembler;
pub mod builder;
pub mod cancellation;
pub mod registry;

pub use assembler::{PaymentRouteAssembler, RoutingError};
pub use builder::{BuilderError, RouterBuilder, RouterFactories};
pub use cancellation::{CancellationError, CancellationInterface, CancellationService};
pub use registry::{NetworkProxyRegistry, ProxyRegistry, RegistryError};

/// Answers whether a payer holds enough funds to settle a request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FundsOracle: Send + Sync {
	async fn has_sufficient_funds(
		&self,
		request: &PaymentRequest,
		payer: &Address,
	) -> Result<bool, OracleError>;
}

/// Answers whether a payer already approved the payment proxy for the amount.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AllowanceOracle: Send + Sync {
	async fn has_sufficient_approval(
		&self,
		request: &PaymentRequest,
		payer: &Address,
	) -> Result<bool, OracleError>;
}

#[async_trait]
impl FundsOracle for OracleService {
	async fn has_sufficient_funds(
		&self,
		request: &PaymentRequest,
		payer: &Address,
	) -> Result<bool, OracleError> {
		OracleService::has_sufficient_funds(self, request, payer).await
	}
}

#[async_trait]
impl AllowanceOracle for OracleService {
	async fn has_sufficient_approval(
		&self,
		request: &PaymentRequest,
		payer: &Address,
	) -> Result<bool, OracleError> {
		OracleService::has_sufficient_approval(self, request, payer).await
	}
}

/// Errors reported by a payment encoder.
#[derive(Debug, Error)]
pub enum EncodingError {
	/// The request lacks a field the payload needs.
	#[error("Missing field for encoding: {0}")]
	MissingField(&'static str),
	/// The encoder rejected the request.
	#[error("Encoding failed: {0}")]
	Failed(String),
}

/// Produces the opaque call payloads for approve and pay operations.
///
/// Payloads are never inspected by the router. Implementations must be
/// deterministic for a given request.
#[cfg_attr(test, mockall::automock)]
pub trait PaymentEncoder: Send + Sync {
	/// Payload approving the ERC20 proxy to spend the amount to pay.
	fn encode_approve(&self, request: &PaymentRequest) -> Result<Bytes, EncodingError>;

	/// Payload paying the request through the ERC20 proxy.
	fn encode_pay_erc20(&self, request: &PaymentRequest) -> Result<Bytes, EncodingError>;

	/// Payload paying the request through the native-currency proxy.
	fn encode_pay_eth_proxy(&self, request: &PaymentRequest) -> Result<Bytes, EncodingError>;
}
