//! Optional observability helpers for acquisition rounds and gateway requests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_gateway.flow` with the `flow` and
//!   `stage` (call site) fields, plus events when acquisition rounds start/settle and when a
//!   business endpoint rejects a credential.
//! - Enable `metrics` to increment the `bearer_gateway_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`. Acquisition rounds also feed
//!   `bearer_gateway_acquisition_rounds_total` (labeled by `success` or the failure kind), the
//!   `bearer_gateway_acquisition_waiters` histogram, and
//!   `bearer_gateway_acquisition_abandoned_waiters_total`; credential rejections feed
//!   `bearer_gateway_credential_rejections_total` labeled by `status` + `stage`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, error::AcquisitionError};

/// Flow kinds observed by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Credential acquisition through the coordinator.
	Acquisition,
	/// Authenticated business request through the gateway.
	Request,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Acquisition => "acquisition",
			FlowKind::Request => "request",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a gateway helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Label for a settled round: `success` or the failure's [`AcquisitionError::kind`].
pub(crate) fn round_outcome(error: Option<&AcquisitionError>) -> &'static str {
	error.map_or("success", AcquisitionError::kind)
}

/// Label for the attempt on which a business endpoint rejected the credential.
pub(crate) fn rejection_stage(attempt: u8) -> &'static str {
	if attempt <= 1 { "initial" } else { "retry" }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn round_and_rejection_labels_follow_the_data() {
		assert_eq!(round_outcome(None), "success");
		assert_eq!(round_outcome(Some(&AcquisitionError::Interrupted)), "interrupted");
		assert_eq!(
			round_outcome(Some(&AcquisitionError::Rejected { status: 403, reason: "quota".into() })),
			"rejected"
		);
		assert_eq!(rejection_stage(1), "initial");
		assert_eq!(rejection_stage(2), "retry");
	}
}
