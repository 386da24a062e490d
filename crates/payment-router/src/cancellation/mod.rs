//! Cancellation of payment requests.
//!
//! A cancellation can lose a race: another session may cancel the same
//! request first. That outcome is reported as
//! [`CancellationError::ExpectedCancellationRace`] so callers can ignore it,
//! while every other failure is an [`CancellationError::UnexpectedFailure`].

use async_trait::async_trait;
use payment_types::{truncate_id, Address, PaymentRequest, RequestStatus};
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a failed cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancellationError {
	/// The request was already canceled, typically by a concurrent attempt.
	#[error("Request already canceled: {0}")]
	ExpectedCancellationRace(String),
	#[error("Cancellation failed: {0}")]
	UnexpectedFailure(String),
}

impl CancellationError {
	/// Whether this failure is a lost race the caller may safely ignore.
	pub fn is_expected_race(&self) -> bool {
		matches!(self, Self::ExpectedCancellationRace(_))
	}
}

/// Performs the cancellation on the request storage layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CancellationInterface: Send + Sync {
	async fn cancel(
		&self,
		request: &PaymentRequest,
		canceller: &Address,
	) -> Result<(), CancellationError>;
}

/// Checks whether a cancellation may proceed and classifies its outcome.
pub struct CancellationService {
	implementation: Arc<dyn CancellationInterface>,
}

impl CancellationService {
	pub fn new(implementation: Arc<dyn CancellationInterface>) -> Self {
		Self { implementation }
	}

	/// Cancels `request` on behalf of `canceller`.
	///
	/// Requests that are already canceled are reported as a lost race without
	/// contacting the storage layer.
	pub async fn cancel(
		&self,
		request: &PaymentRequest,
		canceller: &Address,
	) -> Result<(), CancellationError> {
		let request_id = truncate_id(&request.request_id);

		if request.status == RequestStatus::Canceled {
			tracing::debug!(request_id = %request_id, "Request already canceled");
			return Err(CancellationError::ExpectedCancellationRace(
				request.request_id.clone(),
			));
		}

		if !request.can_be_cancelled_by(canceller) {
			let reason = if request.status == RequestStatus::Paid {
				format!("request {} is already paid", request.request_id)
			} else {
				format!(
					"{} is neither payer nor payee of request {}",
					canceller, request.request_id
				)
			};
			return Err(CancellationError::UnexpectedFailure(reason));
		}

		match self.implementation.cancel(request, canceller).await {
			Ok(()) => {
				tracing::info!(request_id = %request_id, canceller = %canceller, "Request canceled");
				Ok(())
			},
			Err(e) if e.is_expected_race() => {
				tracing::debug!(request_id = %request_id, "Lost cancellation race");
				Err(e)
			},
			Err(e) => {
				tracing::warn!(request_id = %request_id, error = %e, "Cancellation failed");
				Err(e)
			},
		}
	}
}
