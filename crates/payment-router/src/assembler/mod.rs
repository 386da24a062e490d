//! Payment route selection and transaction batch assembly.
//!
//! The assembler inspects a request's currency kind and either produces the
//! ordered transactions that settle it or fails with a [`RoutingError`]. ERC20
//! payments go through the ERC20 proxy, preceded by an approval when the
//! payer's allowance does not cover the amount. Native payments attach the
//! amount to a single call on the native-currency proxy. Other currencies are
//! not payable on chain and are rejected without consulting any collaborator.

use crate::registry::{ProxyRegistry, RegistryError};
use crate::{AllowanceOracle, EncodingError, FundsOracle, PaymentEncoder};
use payment_oracle::OracleError;
use payment_types::{
	truncate_id, Address, CurrencyKind, PaymentRequest, ProxyKind, TransactionBatch,
	TransactionStep, U256,
};
use std::sync::Arc;
use thiserror::Error;

/// Reasons a payment cannot be routed.
///
/// Every variant is terminal for the attempt.
#[derive(Debug, Error)]
pub enum RoutingError {
	/// The payer's balance does not cover the amount to pay.
	#[error("Insufficient funds")]
	InsufficientFunds,
	/// The currency is known but cannot be paid on chain.
	#[error("Unsupported currency: {0}")]
	UnsupportedCurrency(CurrencyKind),
	/// The currency tag is not one the router knows about.
	#[error("Unrecognized currency kind: {0}")]
	UnrecognizedCurrencyKind(String),
	/// The payment proxy for the request's network could not be resolved.
	#[error("Failed to resolve payment proxy: {0}")]
	RegistryResolutionFailure(#[from] RegistryError),
	/// The request is missing data its currency kind requires.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	/// A balance or allowance read failed.
	#[error("Oracle error: {0}")]
	Oracle(#[from] OracleError),
	/// The encoder could not produce a payload.
	#[error("Encoding error: {0}")]
	Encoding(#[from] EncodingError),
}

/// Decides which transactions settle a payment request.
///
/// Holds no state between calls; collaborators are shared and may be used
/// concurrently by several attempts.
pub struct PaymentRouteAssembler {
	funds: Arc<dyn FundsOracle>,
	allowance: Arc<dyn AllowanceOracle>,
	encoder: Arc<dyn PaymentEncoder>,
	registry: Arc<dyn ProxyRegistry>,
}

impl PaymentRouteAssembler {
	pub fn new(
		funds: Arc<dyn FundsOracle>,
		allowance: Arc<dyn AllowanceOracle>,
		encoder: Arc<dyn PaymentEncoder>,
		registry: Arc<dyn ProxyRegistry>,
	) -> Self {
		Self {
			funds,
			allowance,
			encoder,
			registry,
		}
	}

	/// Builds the transaction batch that pays `request` from `payer`.
	///
	/// Approval, when needed, always precedes the pay step. No batch is
	/// returned unless every step could be built.
	pub async fn assemble(
		&self,
		request: &PaymentRequest,
		payer: &Address,
	) -> Result<TransactionBatch, RoutingError> {
		let batch = match &request.currency_kind {
			CurrencyKind::Erc20 => self.assemble_erc20(request, payer).await?,
			CurrencyKind::NativeEth => self.assemble_native(request, payer).await?,
			kind @ (CurrencyKind::Btc | CurrencyKind::FiatIso4217) => {
				return Err(RoutingError::UnsupportedCurrency(kind.clone()));
			},
			CurrencyKind::Unrecognized(tag) => {
				return Err(RoutingError::UnrecognizedCurrencyKind(tag.clone()));
			},
		};

		tracing::debug!(
			request_id = %truncate_id(&request.request_id),
			currency = %request.currency_kind,
			network_id = ?request.network_id,
			steps = batch.len(),
			requires_approval = batch.requires_approval(),
			"Assembled payment route"
		);
		Ok(batch)
	}

	async fn assemble_erc20(
		&self,
		request: &PaymentRequest,
		payer: &Address,
	) -> Result<TransactionBatch, RoutingError> {
		let token = request.token_contract_address.clone().ok_or_else(|| {
			RoutingError::InvalidRequest("ERC20 request without token contract address".into())
		})?;
		let proxy = self
			.registry
			.resolve_address(ProxyKind::Erc20Proxy, request.network_id)?;

		let (funds, allowance) = tokio::join!(
			self.funds.has_sufficient_funds(request, payer),
			self.allowance.has_sufficient_approval(request, payer),
		);

		// Funds decide first: a payer who cannot pay gets no approval either.
		if !funds? {
			return Err(RoutingError::InsufficientFunds);
		}

		let approval = if allowance? {
			None
		} else {
			Some(TransactionStep::approve(
				token,
				self.encoder.encode_approve(request)?,
			))
		};
		let pay = TransactionStep::pay(proxy, U256::ZERO, self.encoder.encode_pay_erc20(request)?);

		Ok(TransactionBatch::new(approval, pay))
	}

	async fn assemble_native(
		&self,
		request: &PaymentRequest,
		payer: &Address,
	) -> Result<TransactionBatch, RoutingError> {
		let proxy = self
			.registry
			.resolve_address(ProxyKind::EthProxy, request.network_id)?;

		if !self.funds.has_sufficient_funds(request, payer).await? {
			return Err(RoutingError::InsufficientFunds);
		}

		let pay = TransactionStep::pay(
			proxy,
			request.amount_to_pay,
			self.encoder.encode_pay_eth_proxy(request)?,
		);
		Ok(TransactionBatch::new(None, pay))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::registry::{MockProxyRegistry, NetworkProxyRegistry};
	use crate::{MockAllowanceOracle, MockFundsOracle, MockPaymentEncoder};
	use payment_config::{testing::SAMPLE_CONFIG, Config};
	use payment_types::{Bytes, RequestStatus, StepKind};

	const TOKEN: &str = "0x9FBDa871d559710256a2502A2517b794B482Db40";
	const PAYER: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
	const PAYEE: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

	fn address(hex: &str) -> Address {
		hex.parse().unwrap()
	}

	fn request(kind: CurrencyKind, amount: u64, network_id: Option<u64>) -> PaymentRequest {
		PaymentRequest {
			request_id: "01a2b3c4d5e6f708".to_string(),
			token_contract_address: (kind == CurrencyKind::Erc20).then(|| address(TOKEN)),
			currency_kind: kind,
			network_id,
			payer_address: Some(address(PAYER)),
			payee_address: Some(address(PAYEE)),
			payment_address: Some(address(PAYEE)),
			amount_to_pay: U256::from(amount),
			status: RequestStatus::Open,
		}
	}

	fn funds(sufficient: bool) -> MockFundsOracle {
		let mut oracle = MockFundsOracle::new();
		oracle
			.expect_has_sufficient_funds()
			.times(1)
			.returning(move |_, _| Ok(sufficient));
		oracle
	}

	fn allowance(sufficient: bool) -> MockAllowanceOracle {
		let mut oracle = MockAllowanceOracle::new();
		oracle
			.expect_has_sufficient_approval()
			.times(1)
			.returning(move |_, _| Ok(sufficient));
		oracle
	}

	fn encoder() -> MockPaymentEncoder {
		let mut encoder = MockPaymentEncoder::new();
		encoder
			.expect_encode_approve()
			.returning(|_| Ok(Bytes::from_static(b"approve")));
		encoder
			.expect_encode_pay_erc20()
			.returning(|_| Ok(Bytes::from_static(b"pay-erc20")));
		encoder
			.expect_encode_pay_eth_proxy()
			.returning(|_| Ok(Bytes::from_static(b"pay-eth")));
		encoder
	}

	fn config_registry() -> NetworkProxyRegistry {
		let config: Config = SAMPLE_CONFIG.parse().unwrap();
		NetworkProxyRegistry::new(config.networks)
	}

	fn assembler(
		funds: MockFundsOracle,
		allowance: MockAllowanceOracle,
		encoder: MockPaymentEncoder,
	) -> PaymentRouteAssembler {
		PaymentRouteAssembler::new(
			Arc::new(funds),
			Arc::new(allowance),
			Arc::new(encoder),
			Arc::new(config_registry()),
		)
	}

	/// An assembler whose collaborators fail the test if touched at all.
	fn untouched_assembler() -> PaymentRouteAssembler {
		let mut funds = MockFundsOracle::new();
		funds.expect_has_sufficient_funds().never();
		let mut allowance = MockAllowanceOracle::new();
		allowance.expect_has_sufficient_approval().never();
		let mut encoder = MockPaymentEncoder::new();
		encoder.expect_encode_approve().never();
		encoder.expect_encode_pay_erc20().never();
		encoder.expect_encode_pay_eth_proxy().never();
		let mut registry = MockProxyRegistry::new();
		registry.expect_resolve_address().never();

		PaymentRouteAssembler::new(
			Arc::new(funds),
			Arc::new(allowance),
			Arc::new(encoder),
			Arc::new(registry),
		)
	}

	#[tokio::test]
	async fn test_erc20_without_allowance_prepends_approval() {
		let assembler = assembler(funds(true), allowance(false), encoder());
		let batch = assembler
			.assemble(&request(CurrencyKind::Erc20, 100, Some(1)), &address(PAYER))
			.await
			.unwrap();

		assert_eq!(batch.len(), 2);
		let approve = &batch.steps()[0];
		assert_eq!(approve.kind, StepKind::Approve);
		assert_eq!(approve.target, address(TOKEN));
		assert_eq!(approve.value, U256::ZERO);
		assert_eq!(approve.payload, Bytes::from_static(b"approve"));

		let pay = &batch.steps()[1];
		assert_eq!(pay.kind, StepKind::Pay);
		assert_eq!(
			pay.target,
			address("0x370DE27fdb7D1Ff1e1BaA7D11c5820a324Cf623C")
		);
		assert_eq!(pay.value, U256::ZERO);
		assert_eq!(pay.payload, Bytes::from_static(b"pay-erc20"));
	}

	#[tokio::test]
	async fn test_erc20_with_allowance_pays_directly() {
		let mut encoder = MockPaymentEncoder::new();
		encoder.expect_encode_approve().never();
		encoder
			.expect_encode_pay_erc20()
			.times(1)
			.returning(|_| Ok(Bytes::from_static(b"pay-erc20")));

		let assembler = assembler(funds(true), allowance(true), encoder);
		let batch = assembler
			.assemble(&request(CurrencyKind::Erc20, 100, Some(1)), &address(PAYER))
			.await
			.unwrap();

		assert_eq!(batch.len(), 1);
		assert!(!batch.requires_approval());
		assert_eq!(
			batch.pay_step().target,
			address("0x370de27fdb7d1ff1e1baa7d11c5820a324cf623c")
		);
		assert_eq!(batch.pay_step().value, U256::ZERO);
	}

	#[tokio::test]
	async fn test_erc20_insufficient_funds_wins_over_allowance() {
		let mut encoder = MockPaymentEncoder::new();
		encoder.expect_encode_approve().never();
		encoder.expect_encode_pay_erc20().never();

		let assembler = assembler(funds(false), allowance(false), encoder);
		let result = assembler
			.assemble(&request(CurrencyKind::Erc20, 100, Some(1)), &address(PAYER))
			.await;

		assert!(matches!(result, Err(RoutingError::InsufficientFunds)));
	}

	#[tokio::test]
	async fn test_oracles_receive_request_and_payer() {
		let mut funds = MockFundsOracle::new();
		funds
			.expect_has_sufficient_funds()
			.withf(|request, payer| {
				request.amount_to_pay == U256::from(100)
					&& *payer == PAYER.to_lowercase().parse::<Address>().unwrap()
			})
			.times(1)
			.returning(|_, _| Ok(true));
		let mut allowance = MockAllowanceOracle::new();
		allowance
			.expect_has_sufficient_approval()
			.withf(|request, _| request.network_id == Some(1))
			.times(1)
			.returning(|_, _| Ok(true));

		let assembler = assembler(funds, allowance, encoder());
		assembler
			.assemble(&request(CurrencyKind::Erc20, 100, Some(1)), &address(PAYER))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_native_payment_attaches_amount() {
		let mut allowance = MockAllowanceOracle::new();
		allowance.expect_has_sufficient_approval().never();

		let assembler = assembler(funds(true), allowance, encoder());
		let batch = assembler
			.assemble(
				&request(CurrencyKind::NativeEth, 500, Some(5)),
				&address(PAYER),
			)
			.await
			.unwrap();

		assert_eq!(batch.len(), 1);
		let pay = batch.pay_step();
		assert_eq!(pay.kind, StepKind::Pay);
		assert_eq!(
			pay.target,
			address("0x9c6c7817e3679c4b3f9ef9486001eae5aaed25ff")
		);
		assert_eq!(pay.value, U256::from(500));
		assert_eq!(pay.payload, Bytes::from_static(b"pay-eth"));
	}

	#[tokio::test]
	async fn test_native_insufficient_funds() {
		let mut allowance = MockAllowanceOracle::new();
		allowance.expect_has_sufficient_approval().never();

		let assembler = assembler(funds(false), allowance, MockPaymentEncoder::new());
		let result = assembler
			.assemble(
				&request(CurrencyKind::NativeEth, 500, Some(5)),
				&address(PAYER),
			)
			.await;

		assert!(matches!(result, Err(RoutingError::InsufficientFunds)));
	}

	#[tokio::test]
	async fn test_non_evm_currencies_make_no_calls() {
		let assembler = untouched_assembler();

		for kind in [CurrencyKind::Btc, CurrencyKind::FiatIso4217] {
			let result = assembler
				.assemble(&request(kind.clone(), 100, None), &address(PAYER))
				.await;
			assert!(matches!(result, Err(RoutingError::UnsupportedCurrency(k)) if k == kind));
		}
	}

	#[tokio::test]
	async fn test_unrecognized_currency_kind() {
		let assembler = untouched_assembler();
		let result = assembler
			.assemble(
				&request(CurrencyKind::from_tag("XRP"), 100, Some(1)),
				&address(PAYER),
			)
			.await;

		assert!(matches!(result, Err(RoutingError::UnrecognizedCurrencyKind(tag)) if tag == "XRP"));
	}

	#[tokio::test]
	async fn test_missing_network_fails_resolution() {
		let mut funds = MockFundsOracle::new();
		funds.expect_has_sufficient_funds().never();

		let assembler = assembler(funds, MockAllowanceOracle::new(), MockPaymentEncoder::new());
		let result = assembler
			.assemble(&request(CurrencyKind::NativeEth, 500, None), &address(PAYER))
			.await;

		assert!(matches!(
			result,
			Err(RoutingError::RegistryResolutionFailure(
				RegistryError::MissingNetworkId
			))
		));
	}

	#[tokio::test]
	async fn test_unknown_network_fails_resolution() {
		let assembler = assembler(
			MockFundsOracle::new(),
			MockAllowanceOracle::new(),
			MockPaymentEncoder::new(),
		);
		let result = assembler
			.assemble(&request(CurrencyKind::Erc20, 100, Some(137)), &address(PAYER))
			.await;

		assert!(matches!(
			result,
			Err(RoutingError::RegistryResolutionFailure(
				RegistryError::UnknownNetwork {
					network_id: 137,
					..
				}
			))
		));
	}

	#[tokio::test]
	async fn test_erc20_without_token_is_invalid() {
		let mut erc20 = request(CurrencyKind::Erc20, 100, Some(1));
		erc20.token_contract_address = None;

		let result = untouched_assembler()
			.assemble(&erc20, &address(PAYER))
			.await;
		assert!(matches!(result, Err(RoutingError::InvalidRequest(_))));
	}

	#[tokio::test]
	async fn test_oracle_failure_propagates() {
		let mut funds = MockFundsOracle::new();
		funds
			.expect_has_sufficient_funds()
			.returning(|_, _| Err(OracleError::Timeout(15)));

		let assembler = assembler(funds, allowance(true), MockPaymentEncoder::new());
		let result = assembler
			.assemble(&request(CurrencyKind::Erc20, 100, Some(1)), &address(PAYER))
			.await;

		assert!(matches!(
			result,
			Err(RoutingError::Oracle(OracleError::Timeout(15)))
		));
	}

	#[tokio::test]
	async fn test_encoding_failure_yields_no_batch() {
		let mut encoder = MockPaymentEncoder::new();
		encoder
			.expect_encode_approve()
			.returning(|_| Ok(Bytes::from_static(b"approve")));
		encoder
			.expect_encode_pay_erc20()
			.returning(|_| Err(EncodingError::MissingField("paymentAddress")));

		let assembler = assembler(funds(true), allowance(false), encoder);
		let result = assembler
			.assemble(&request(CurrencyKind::Erc20, 100, Some(1)), &address(PAYER))
			.await;

		assert!(matches!(
			result,
			Err(RoutingError::Encoding(EncodingError::MissingField(
				"paymentAddress"
			)))
		));
	}
}
