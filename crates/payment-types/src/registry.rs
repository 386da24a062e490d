//! Self-registration of named implementations.

/// Ties an implementation to the name it is configured under and to the
/// factory that builds it.
///
/// The name is the key used in configuration, e.g. `evm_alloy` for
/// `[oracle.implementations.evm_alloy]`.
pub trait ImplementationRegistry {
	const NAME: &'static str;

	/// Factory signature, defined by the crate that owns the interface.
	type Factory;

	fn factory() -> Self::Factory;
}
