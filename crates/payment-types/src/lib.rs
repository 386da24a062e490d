//! Common types for the request payment router.
//!
//! This crate holds the data shared by every other crate in the workspace:
//! chain addresses, parsed payment requests, the transaction steps produced
//! by routing, network configuration and the configuration validation
//! framework used by pluggable implementations.

/// Chain address representation with case-insensitive parsing.
pub mod address;
/// Network and proxy contract configuration types.
pub mod networks;
/// Registry trait for named, configurable implementations.
pub mod registry;
/// Payment request types as supplied by the request-data provider.
pub mod request;
/// Transaction steps and batches produced by routing.
pub mod transaction;
/// Utility functions for string formatting.
pub mod utils;
/// Configuration validation types.
pub mod validation;

pub use address::{Address, AddressError};
pub use networks::{NetworkConfig, NetworksConfig, ProxyKind};
pub use registry::ImplementationRegistry;
pub use request::{CurrencyKind, PaymentRequest, RequestStatus};
pub use transaction::{StepKind, TransactionBatch, TransactionStep};
pub use utils::{truncate_id, with_0x_prefix, without_0x_prefix};
pub use validation::*;

/// Re-exported so downstream crates agree on the amount and payload types.
pub use alloy_primitives::{Bytes, U256};
