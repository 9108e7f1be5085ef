//! Single-flight credential acquisition with fan-out to every waiter.
//!
//! [`AcquisitionCoordinator::ensure_credential`] is callable from any number of request paths at
//! once. The first caller that finds no usable credential flips the shared state to
//! `InFlight` and launches exactly one fetch against the [`TokenEndpoint`]; every caller that
//! arrives while the fetch is running registers a oneshot waiter instead of starting its own.
//! When the fetch settles, the state is updated and each registered waiter receives the same
//! outcome exactly once.
//!
//! The state lock is a synchronous mutex held only for the transition itself, never across an
//! `.await`. The fetch runs on a detached task bounded by the acquisition timeout, so a caller
//! that gives up cannot stall the round for the others.

mod metrics;

pub use metrics::AcquisitionMetrics;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::{runtime::Handle, sync::oneshot};
// self
use crate::{
	_prelude::*,
	credential::Credential,
	endpoint::TokenEndpoint,
	error::AcquisitionError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

type Outcome = Result<Credential, AcquisitionError>;

/// Suspended caller awaiting the outcome of an in-flight round.
struct Waiter(oneshot::Sender<Outcome>);
impl Waiter {
	fn resume(self, outcome: Outcome) -> bool {
		self.0.send(outcome).is_ok()
	}
}

enum AcquisitionState {
	Idle,
	InFlight { round: u64, waiters: Vec<Waiter> },
	Settled { round: u64, credential: Credential },
	Failed { round: u64, error: AcquisitionError },
}

/// Waiter-free view of the coordinator state.
#[derive(Clone, Debug)]
pub enum AcquisitionStatus {
	/// No round has run yet.
	Idle,
	/// A fetch is running.
	InFlight {
		/// Round identifier.
		round: u64,
		/// Callers currently suspended on the round.
		waiters: usize,
	},
	/// The latest round produced a credential.
	Settled {
		/// Round identifier.
		round: u64,
	},
	/// The latest round failed; the next caller starts a new round.
	Failed {
		/// Round identifier.
		round: u64,
		/// Failure shared with the round's waiters.
		error: AcquisitionError,
	},
}
impl AcquisitionStatus {
	/// Returns `true` while a fetch is running.
	pub fn is_in_flight(&self) -> bool {
		matches!(self, Self::InFlight { .. })
	}
}

struct Shared<E>
where
	E: ?Sized + TokenEndpoint,
{
	endpoint: Arc<E>,
	store: Arc<TokenStore>,
	timeout: StdDuration,
	state: Mutex<AcquisitionState>,
	rounds: AtomicU64,
	metrics: AcquisitionMetrics,
}
impl<E> Shared<E>
where
	E: ?Sized + TokenEndpoint,
{
	/// Resolves `round` exactly once; later calls for the same round are ignored.
	fn settle(&self, round: u64, outcome: Outcome) {
		let waiters = {
			let mut state = self.state.lock();

			match &*state {
				AcquisitionState::InFlight { round: current, .. } if *current == round => (),
				_ => return,
			}

			let next = match &outcome {
				Ok(credential) => {
					self.store.replace(credential.clone());

					AcquisitionState::Settled { round, credential: credential.clone() }
				},
				Err(error) => AcquisitionState::Failed { round, error: error.clone() },
			};

			match std::mem::replace(&mut *state, next) {
				AcquisitionState::InFlight { waiters, .. } => waiters,
				_ => Vec::new(),
			}
		};
		let total = waiters.len();

		match &outcome {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		let mut abandoned = 0;

		for waiter in waiters {
			if !waiter.resume(outcome.clone()) {
				self.metrics.record_abandoned();

				abandoned += 1;
			}
		}

		obs::round_settled(round, total, abandoned, outcome.as_ref().err());
		obs::record_round_settled(total, abandoned, outcome.as_ref().err());
	}
}

/// Settles its round as interrupted if dropped before the fetch completes.
struct RoundGuard<E>
where
	E: ?Sized + TokenEndpoint,
{
	shared: Arc<Shared<E>>,
	round: u64,
}
impl<E> RoundGuard<E>
where
	E: ?Sized + TokenEndpoint,
{
	async fn run(self) {
		let endpoint = self.shared.endpoint.clone();
		let outcome = match tokio::time::timeout(self.shared.timeout, endpoint.fetch()).await {
			Ok(outcome) => outcome,
			Err(elapsed) => Err(AcquisitionError::network(elapsed)),
		};

		self.shared.settle(self.round, outcome);
	}
}
impl<E> Drop for RoundGuard<E>
where
	E: ?Sized + TokenEndpoint,
{
	fn drop(&mut self) {
		self.shared.settle(self.round, Err(AcquisitionError::Interrupted));
	}
}

/// Coordinates single-flight acquisition of the shared credential.
///
/// Cloning is cheap; all clones share one state machine, one store, and one endpoint.
pub struct AcquisitionCoordinator<E>
where
	E: ?Sized + TokenEndpoint,
{
	shared: Arc<Shared<E>>,
}
impl<E> AcquisitionCoordinator<E>
where
	E: ?Sized + TokenEndpoint,
{
	/// Creates a coordinator that writes into `store` and bounds each fetch by `timeout`.
	pub fn new(endpoint: Arc<E>, store: Arc<TokenStore>, timeout: StdDuration) -> Self {
		Self {
			shared: Arc::new(Shared {
				endpoint,
				store,
				timeout,
				state: Mutex::new(AcquisitionState::Idle),
				rounds: AtomicU64::new(0),
				metrics: AcquisitionMetrics::default(),
			}),
		}
	}

	/// Returns a usable credential, joining or starting a single acquisition round if needed.
	pub async fn ensure_credential(&self) -> Result<Credential, AcquisitionError> {
		const KIND: FlowKind = FlowKind::Acquisition;

		let span = FlowSpan::new(KIND, "ensure_credential");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let receiver = match self.register() {
					Ok(credential) => return Ok(credential),
					Err(receiver) => receiver,
				};

				receiver.await.unwrap_or(Err(AcquisitionError::Interrupted))
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Marks `rejected` unusable if it is still the stored credential.
	///
	/// Returns `true` when the stored credential was invalidated by this call.
	pub fn invalidate(&self, rejected: &Credential) -> bool {
		self.shared.store.invalidate_if_current(rejected)
	}

	/// Returns a snapshot of the current state.
	pub fn status(&self) -> AcquisitionStatus {
		match &*self.shared.state.lock() {
			AcquisitionState::Idle => AcquisitionStatus::Idle,
			AcquisitionState::InFlight { round, waiters } =>
				AcquisitionStatus::InFlight { round: *round, waiters: waiters.len() },
			AcquisitionState::Settled { round, .. } => AcquisitionStatus::Settled { round: *round },
			AcquisitionState::Failed { round, error } =>
				AcquisitionStatus::Failed { round: *round, error: error.clone() },
		}
	}

	/// Credential published by the most recent successful round, even if since invalidated.
	pub fn last_settled(&self) -> Option<Credential> {
		match &*self.shared.state.lock() {
			AcquisitionState::Settled { credential, .. } => Some(credential.clone()),
			_ => None,
		}
	}

	/// Shared token store.
	pub fn store(&self) -> &Arc<TokenStore> {
		&self.shared.store
	}

	/// Round counters.
	pub fn metrics(&self) -> &AcquisitionMetrics {
		&self.shared.metrics
	}

	/// Performs the state transition under the lock.
	///
	/// Returns the credential directly when no suspension is needed, otherwise the receiver the
	/// caller must await.
	fn register(&self) -> Result<Credential, oneshot::Receiver<Outcome>> {
		let (sender, receiver) = oneshot::channel();
		let round = {
			let mut state = self.shared.state.lock();

			if let AcquisitionState::InFlight { waiters, .. } = &mut *state {
				waiters.push(Waiter(sender));
				self.shared.metrics.record_joined();

				return Err(receiver);
			}
			if let Some(credential) = self.shared.store.current() {
				self.shared.metrics.record_cache_hit();

				return Ok(credential);
			}

			let round = self.shared.rounds.fetch_add(1, Ordering::Relaxed) + 1;

			*state = AcquisitionState::InFlight { round, waiters: vec![Waiter(sender)] };

			round
		};

		self.shared.metrics.record_round();
		obs::round_started(round);
		self.spawn_round(round);

		Err(receiver)
	}

	fn spawn_round(&self, round: u64) {
		let guard = RoundGuard { shared: self.shared.clone(), round };

		// Without a runtime the guard drops here and settles the round as interrupted.
		if let Ok(handle) = Handle::try_current() {
			handle.spawn(guard.run());
		}
	}
}
impl<E> Clone for AcquisitionCoordinator<E>
where
	E: ?Sized + TokenEndpoint,
{
	fn clone(&self) -> Self {
		Self { shared: self.shared.clone() }
	}
}
impl<E> Debug for AcquisitionCoordinator<E>
where
	E: ?Sized + TokenEndpoint,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AcquisitionCoordinator")
			.field("status", &self.status())
			.field("timeout", &self.shared.timeout)
			.field("metrics", &self.shared.metrics)
			.finish()
	}
}
