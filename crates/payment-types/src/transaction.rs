//! Transaction steps produced by payment routing.

use crate::Address;
use alloy_primitives::{Bytes, U256};
use serde::Serialize;

/// What a step does on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
	/// Grants the payment proxy an ERC20 allowance.
	Approve,
	/// Settles the request through a payment proxy.
	Pay,
}

/// A single transaction to be submitted by the payer.
///
/// The payload is produced by the encoder and is never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionStep {
	pub kind: StepKind,
	/// Destination contract or account.
	pub target: Address,
	/// Native currency attached to the call. Zero unless paying in the native currency.
	#[serde(serialize_with = "crate::request::amount::serialize")]
	pub value: U256,
	/// Encoded call data.
	pub payload: Bytes,
}

impl TransactionStep {
	/// Creates an approval step. Approvals never carry native value.
	pub fn approve(target: Address, payload: Bytes) -> Self {
		Self {
			kind: StepKind::Approve,
			target,
			value: U256::ZERO,
			payload,
		}
	}

	/// Creates a pay step.
	pub fn pay(target: Address, value: U256, payload: Bytes) -> Self {
		Self {
			kind: StepKind::Pay,
			target,
			value,
			payload,
		}
	}
}

/// An ordered set of steps that settles one request.
///
/// A batch always holds exactly one pay step, optionally preceded by a single
/// approval step. The constructor is the only way to build one, so a partial
/// or misordered batch cannot exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TransactionBatch {
	steps: Vec<TransactionStep>,
}

impl TransactionBatch {
	/// Builds a batch from an optional approval and the pay step.
	pub fn new(approval: Option<TransactionStep>, pay: TransactionStep) -> Self {
		let mut steps = Vec::with_capacity(2);
		steps.extend(approval);
		steps.push(pay);
		Self { steps }
	}

	/// The steps in submission order.
	pub fn steps(&self) -> &[TransactionStep] {
		&self.steps
	}

	pub fn len(&self) -> usize {
		self.steps.len()
	}

	/// Always false; present for API symmetry with `len`.
	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	/// Whether the batch starts with an approval.
	pub fn requires_approval(&self) -> bool {
		self.steps
			.first()
			.is_some_and(|step| step.kind == StepKind::Approve)
	}

	/// The step that settles the request.
	pub fn pay_step(&self) -> &TransactionStep {
		// The last step is the pay step by construction.
		&self.steps[self.steps.len() - 1]
	}

	/// Consumes the batch, returning its steps in submission order.
	pub fn into_steps(self) -> Vec<TransactionStep> {
		self.steps
	}
}

impl IntoIterator for TransactionBatch {
	type Item = TransactionStep;
	type IntoIter = std::vec::IntoIter<TransactionStep>;

	fn into_iter(self) -> Self::IntoIter {
		self.steps.into_iter()
	}
}
