//! Chain address type.
//!
//! Addresses are stored as decoded bytes, so two addresses that differ only
//! in the case of their hex digits (for example a checksummed and a
//! lowercase rendering) compare equal.

use crate::utils::{with_0x_prefix, without_0x_prefix};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length in bytes of an EVM account or contract address.
pub const ADDRESS_LENGTH: usize = 20;

/// Errors that can occur when parsing an address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
	/// The input is not valid hex.
	#[error("Invalid hex in address '{0}'")]
	InvalidHex(String),
	/// The decoded address has the wrong number of bytes.
	#[error("Invalid address length: expected 20 bytes, got {0}")]
	InvalidLength(usize),
}

/// A 20-byte chain address.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Address(pub Vec<u8>);

impl Address {
	/// Creates an address from raw bytes, checking the length.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
		if bytes.len() != ADDRESS_LENGTH {
			return Err(AddressError::InvalidLength(bytes.len()));
		}
		Ok(Self(bytes.to_vec()))
	}

	/// Returns the lowercase hex rendering without the `0x` prefix.
	pub fn to_hex(&self) -> String {
		hex::encode(&self.0)
	}

	/// Converts into the alloy address type used by RPC clients.
	pub fn to_alloy(&self) -> Result<alloy_primitives::Address, AddressError> {
		if self.0.len() != ADDRESS_LENGTH {
			return Err(AddressError::InvalidLength(self.0.len()));
		}
		Ok(alloy_primitives::Address::from_slice(&self.0))
	}
}

impl From<alloy_primitives::Address> for Address {
	fn from(address: alloy_primitives::Address) -> Self {
		Self(address.as_slice().to_vec())
	}
}

impl FromStr for Address {
	type Err = AddressError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes = hex::decode(without_0x_prefix(s.trim()))
			.map_err(|_| AddressError::InvalidHex(s.to_string()))?;
		Self::from_slice(&bytes)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&with_0x_prefix(&self.to_hex()))
	}
}

impl fmt::Debug for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Address({})", self)
	}
}

impl Serialize for Address {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_string())
	}
}

impl<'de> Deserialize<'de> for Address {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}
