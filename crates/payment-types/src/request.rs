//! Payment request types.
//!
//! A `PaymentRequest` is produced by the request-data provider and is read-only
//! for every component in this workspace. It is fetched fresh for each payment
//! attempt and never cached.

use crate::Address;
use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The kind of currency a request is denominated in.
///
/// Tags outside the recognized set are preserved in `Unrecognized` so that
/// routing can reject them explicitly instead of silently ignoring them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CurrencyKind {
	/// An ERC20 token on an EVM network.
	Erc20,
	/// The native currency of an EVM network.
	NativeEth,
	/// Bitcoin.
	Btc,
	/// An ISO 4217 fiat currency.
	FiatIso4217,
	/// Any tag this crate does not know about.
	Unrecognized(String),
}

impl CurrencyKind {
	/// Maps a wire tag to a currency kind. Matching is case-insensitive.
	pub fn from_tag(tag: &str) -> Self {
		match tag.trim().to_ascii_uppercase().as_str() {
			"ERC20" => Self::Erc20,
			"ETH" | "NATIVE_ETH" => Self::NativeEth,
			"BTC" => Self::Btc,
			"ISO4217" | "FIAT_ISO4217" => Self::FiatIso4217,
			_ => Self::Unrecognized(tag.to_string()),
		}
	}

	/// Returns the canonical wire tag.
	pub fn as_tag(&self) -> &str {
		match self {
			Self::Erc20 => "ERC20",
			Self::NativeEth => "ETH",
			Self::Btc => "BTC",
			Self::FiatIso4217 => "ISO4217",
			Self::Unrecognized(tag) => tag,
		}
	}

	/// Whether requests of this kind settle on an EVM network.
	pub fn is_evm(&self) -> bool {
		matches!(self, Self::Erc20 | Self::NativeEth)
	}
}

impl fmt::Display for CurrencyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_tag())
	}
}

impl Serialize for CurrencyKind {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_tag())
	}
}

impl<'de> Deserialize<'de> for CurrencyKind {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let tag = String::deserialize(deserializer)?;
		Ok(Self::from_tag(&tag))
	}
}

/// Lifecycle status of a request, as computed by the request-data provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
	/// Created but not yet confirmed on the storage layer.
	Pending,
	/// Awaiting payment.
	#[default]
	Open,
	/// Fully paid.
	Paid,
	/// Canceled by the payer or payee.
	Canceled,
}

/// A parsed payment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
	/// Identifier of the request on the request storage layer.
	pub request_id: String,
	pub currency_kind: CurrencyKind,
	/// Token contract, present only for ERC20 requests.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_contract_address: Option<Address>,
	/// Chain id the payment settles on. Required for EVM kinds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub network_id: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payer_address: Option<Address>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payee_address: Option<Address>,
	/// Address the funds are forwarded to by the proxy contract.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payment_address: Option<Address>,
	/// Remaining amount in the currency's smallest unit.
	#[serde(with = "crate::request::amount")]
	pub amount_to_pay: U256,
	#[serde(default)]
	pub status: RequestStatus,
}

impl PaymentRequest {
	/// Whether `address` is the request's payer.
	pub fn is_payer(&self, address: &Address) -> bool {
		self.payer_address.as_ref() == Some(address)
	}

	/// Whether `address` is the request's payee.
	pub fn is_payee(&self, address: &Address) -> bool {
		self.payee_address.as_ref() == Some(address)
	}

	/// Whether `address` may cancel the request in its current status.
	///
	/// Only pending or open requests can be canceled, and only by one of the
	/// two parties.
	pub fn can_be_cancelled_by(&self, address: &Address) -> bool {
		matches!(self.status, RequestStatus::Pending | RequestStatus::Open)
			&& (self.is_payer(address) || self.is_payee(address))
	}
}

/// Serde helpers for amounts.
///
/// Amounts serialize as decimal strings and deserialize from either a decimal
/// (or `0x`-prefixed hex) string or a JSON integer.
pub mod amount {
	use alloy_primitives::U256;
	use serde::{Deserialize, Deserializer, Serializer};

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum RawAmount {
		Text(String),
		Number(u64),
	}

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&value.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		match RawAmount::deserialize(deserializer)? {
			RawAmount::Text(text) => text
				.trim()
				.parse::<U256>()
				.map_err(|e| serde::de::Error::custom(format!("Invalid amount '{}': {}", text, e))),
			RawAmount::Number(n) => Ok(U256::from(n)),
		}
	}
}
