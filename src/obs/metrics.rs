// self
use crate::{
	error::AcquisitionError,
	obs::{self, FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_gateway_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a settled acquisition round: its outcome label, fan-out size, and abandoned waiters.
pub(crate) fn record_round_settled(
	waiters: usize,
	abandoned: usize,
	error: Option<&AcquisitionError>,
) {
	let outcome = obs::round_outcome(error);

	#[cfg(feature = "metrics")]
	{
		metrics::counter!("bearer_gateway_acquisition_rounds_total", "outcome" => outcome)
			.increment(1);
		metrics::histogram!("bearer_gateway_acquisition_waiters").record(waiters as f64);
		metrics::counter!("bearer_gateway_acquisition_abandoned_waiters_total")
			.increment(abandoned as u64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (waiters, abandoned, outcome);
	}
}

/// Records a business response that rejected the credential on the given attempt.
pub(crate) fn record_credential_rejected(status: u16, attempt: u8) {
	let stage = obs::rejection_stage(attempt);

	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_gateway_credential_rejections_total",
			"status" => status.to_string(),
			"stage" => stage
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (status, stage);
	}
}
