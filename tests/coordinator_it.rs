// std
use std::io::{Error as IoError, ErrorKind};
// self
use bearer_gateway::{
	_preludet::*,
	coordinator::{AcquisitionCoordinator, AcquisitionStatus},
	credential::Credential,
	endpoint::TokenEndpoint,
	error::AcquisitionError,
};

fn refused() -> AcquisitionError {
	AcquisitionError::network(IoError::new(ErrorKind::ConnectionRefused, "token endpoint down"))
}

async fn run_concurrently<E>(
	coordinator: &AcquisitionCoordinator<E>,
	callers: usize,
) -> Vec<Result<Credential, AcquisitionError>>
where
	E: ?Sized + TokenEndpoint,
{
	let handles = (0..callers)
		.map(|_| {
			let coordinator = coordinator.clone();

			tokio::spawn(async move { coordinator.ensure_credential().await })
		})
		.collect::<Vec<_>>();
	let mut results = Vec::with_capacity(callers);

	for handle in handles {
		results.push(handle.await.expect("Caller task should not panic."));
	}

	results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fifty_concurrent_callers_share_one_fetch() {
	let endpoint = Arc::new(CountingEndpoint::issuing("abc123", StdDuration::from_millis(250)));
	let (coordinator, store) = build_test_coordinator(endpoint.clone(), StdDuration::from_secs(5));
	let results = run_concurrently(&coordinator, 50).await;

	assert_eq!(endpoint.calls(), 1);
	assert_eq!(results.len(), 50);

	for result in results {
		let credential = result.expect("Every caller should receive the credential.");

		assert_eq!(credential.token.expose(), "abc123");
	}

	let metrics = coordinator.metrics();

	assert_eq!(metrics.rounds(), 1);
	assert_eq!(metrics.successes(), 1);
	assert_eq!(metrics.joined() + metrics.cache_hits(), 49);
	assert_eq!(
		store.current().map(|credential| credential.token.expose().to_owned()).as_deref(),
		Some("abc123")
	);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_fetch_reaches_every_waiter_and_stays_retriable() {
	let endpoint = Arc::new(CountingEndpoint::failing(refused(), StdDuration::from_millis(250)));
	let (coordinator, store) = build_test_coordinator(endpoint.clone(), StdDuration::from_secs(5));
	let results = run_concurrently(&coordinator, 20).await;

	assert_eq!(endpoint.calls(), 1);

	for result in results {
		let err = result.expect_err("Every waiter should observe the failure.");

		assert!(matches!(err, AcquisitionError::Network { .. }));
	}

	assert!(!coordinator.status().is_in_flight());
	assert!(matches!(coordinator.status(), AcquisitionStatus::Failed { round: 1, .. }));
	assert!(store.current().is_none());

	let _ = coordinator.ensure_credential().await;

	assert_eq!(endpoint.calls(), 2, "A caller after the failure should start a new round.");
}

#[tokio::test]
async fn failure_is_not_retried_internally() {
	let endpoint = Arc::new(CountingEndpoint::scripted(
		[Err(refused()), Ok("abc123".to_owned())],
		StdDuration::from_millis(10),
	));
	let (coordinator, _store) = build_test_coordinator(endpoint.clone(), StdDuration::from_secs(5));

	coordinator.ensure_credential().await.expect_err("First round should fail.");

	assert_eq!(endpoint.calls(), 1);

	let credential = coordinator.ensure_credential().await.expect("Second round should succeed.");

	assert_eq!(credential.token.expose(), "abc123");
	assert_eq!(endpoint.calls(), 2);
	assert_eq!(coordinator.metrics().failures(), 1);
	assert_eq!(coordinator.metrics().successes(), 1);
}

#[tokio::test]
async fn settled_credential_is_reused_without_network_calls() {
	let endpoint = Arc::new(CountingEndpoint::issuing("abc123", StdDuration::from_millis(10)));
	let (coordinator, _store) = build_test_coordinator(endpoint.clone(), StdDuration::from_secs(5));

	for _ in 0..10 {
		let credential = coordinator.ensure_credential().await.expect("Calls should succeed.");

		assert_eq!(credential.token.expose(), "abc123");
	}

	assert_eq!(endpoint.calls(), 1);
	assert_eq!(coordinator.metrics().cache_hits(), 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalidation_triggers_exactly_one_new_fetch() {
	let endpoint = Arc::new(CountingEndpoint::scripted(
		[Ok("first".to_owned()), Ok("second".to_owned())],
		StdDuration::from_millis(250),
	));
	let (coordinator, store) = build_test_coordinator(endpoint.clone(), StdDuration::from_secs(5));
	let first = coordinator.ensure_credential().await.expect("Initial round should succeed.");

	assert_eq!(first.token.expose(), "first");
	assert!(coordinator.invalidate(&first));

	let stale = store.snapshot().expect("Invalidated credential should be retained.");

	assert!(stale.is_invalidated());

	let results = run_concurrently(&coordinator, 20).await;

	assert_eq!(endpoint.calls(), 2);

	for result in results {
		let credential = result.expect("Every caller should receive the new credential.");

		assert_eq!(credential.token.expose(), "second");
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_caller_does_not_strand_the_round() {
	let endpoint = Arc::new(CountingEndpoint::issuing("abc123", StdDuration::from_millis(200)));
	let (coordinator, _store) = build_test_coordinator(endpoint.clone(), StdDuration::from_secs(5));
	let impatient =
		tokio::time::timeout(StdDuration::from_millis(20), coordinator.ensure_credential()).await;

	assert!(impatient.is_err(), "The initiating caller should give up before the fetch settles.");

	let patient = coordinator.ensure_credential().await.expect("Remaining caller should resume.");

	assert_eq!(patient.token.expose(), "abc123");
	assert_eq!(endpoint.calls(), 1);
}

#[tokio::test]
async fn slow_fetch_times_out_for_all_waiters() {
	let endpoint = Arc::new(CountingEndpoint::issuing("late", StdDuration::from_secs(2)));
	let (coordinator, _store) =
		build_test_coordinator(endpoint.clone(), StdDuration::from_millis(50));
	let (first, second) =
		tokio::join!(coordinator.ensure_credential(), coordinator.ensure_credential());

	for result in [first, second] {
		let err = result.expect_err("Timed out rounds should fail.");

		assert!(matches!(err, AcquisitionError::Network { .. }));
	}

	assert_eq!(endpoint.calls(), 1);
	assert!(matches!(coordinator.status(), AcquisitionStatus::Failed { .. }));
}

#[tokio::test]
async fn seeded_store_skips_acquisition() {
	let endpoint = Arc::new(CountingEndpoint::issuing("unused", StdDuration::from_millis(10)));
	let (coordinator, store) = build_test_coordinator(endpoint.clone(), StdDuration::from_secs(5));

	store.replace(Credential::new("seeded"));

	let credential =
		coordinator.ensure_credential().await.expect("Seeded credential should be used.");

	assert_eq!(credential.token.expose(), "seeded");
	assert_eq!(endpoint.calls(), 0);
	assert!(matches!(coordinator.status(), AcquisitionStatus::Idle));
}
