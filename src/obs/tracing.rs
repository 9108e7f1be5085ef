// self
use crate::{_prelude::*, error::AcquisitionError, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by gateway flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("bearer_gateway.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

pub(crate) fn round_started(round: u64) {
	#[cfg(feature = "tracing")]
	tracing::debug!(round, "starting token acquisition round");
	#[cfg(not(feature = "tracing"))]
	let _ = round;
}

pub(crate) fn round_settled(
	round: u64,
	waiters: usize,
	abandoned: usize,
	error: Option<&AcquisitionError>,
) {
	#[cfg(feature = "tracing")]
	match error {
		None => tracing::debug!(round, waiters, abandoned, "token acquisition round settled"),
		Some(error) => tracing::warn!(
			round,
			waiters,
			abandoned,
			kind = error.kind(),
			error = %error,
			"token acquisition round failed"
		),
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (round, waiters, abandoned, error);
}

pub(crate) fn credential_rejected(status: u16, attempt: u8) {
	#[cfg(feature = "tracing")]
	tracing::info!(
		status,
		attempt,
		stage = crate::obs::rejection_stage(attempt),
		"business endpoint rejected the credential"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (status, attempt);
}
