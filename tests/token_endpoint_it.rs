// crates.io
use httpmock::prelude::*;
// self
use bearer_gateway::{
	_preludet::*,
	endpoint::{ReqwestTokenEndpoint, TokenEndpoint},
	error::AcquisitionError,
};

const BASE_PATH: &str = "/interface/v1";
const TOKEN_PATH: &str = "/interface/v1/access_token";

fn build_endpoint(server: &MockServer) -> ReqwestTokenEndpoint {
	let config = test_config_builder(&server.url(BASE_PATH))
		.expect("Mock server URL should produce a configuration builder.")
		.token_param("corporate_id", "10")
		.build()
		.expect("Loopback configuration should validate.");

	ReqwestTokenEndpoint::from_config(ReqwestClient::new(), &config)
		.expect("Token endpoint should build from validated configuration.")
}

#[tokio::test]
async fn fetch_posts_api_key_and_parses_token() {
	let server = MockServer::start_async().await;
	let endpoint = build_endpoint(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("Api-Key", TEST_API_KEY)
				.query_param("corporate_id", "10");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"abc123\",\"expires_in\":3600}");
		})
		.await;
	let credential = endpoint.fetch().await.expect("Token request should succeed.");

	assert_eq!(credential.token.expose(), "abc123");
	assert!(credential.expires_at.is_some());
	assert!(credential.is_usable_at(OffsetDateTime::now_utc()));
	assert_eq!(endpoint.url().path(), TOKEN_PATH);

	mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_maps_to_rejected() {
	let server = MockServer::start_async().await;
	let endpoint = build_endpoint(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(403).body("quota exceeded");
		})
		.await;
	let err = endpoint.fetch().await.expect_err("Forbidden responses should fail the fetch.");

	match err {
		AcquisitionError::Rejected { status, reason } => {
			assert_eq!(status, 403);
			assert_eq!(reason, "quota exceeded");
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	mock.assert_async().await;
}

#[tokio::test]
async fn unparsable_body_maps_to_malformed_response() {
	let server = MockServer::start_async().await;
	let endpoint = build_endpoint(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body("{\"data\":{}}");
		})
		.await;
	let err = endpoint.fetch().await.expect_err("Payloads without a token should fail.");

	assert!(matches!(err, AcquisitionError::MalformedResponse { status: 200, .. }));

	mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_endpoint_maps_to_network_error() {
	let config = test_config_builder("http://127.0.0.1:9/interface/v1")
		.expect("Loopback URL should produce a configuration builder.")
		.build()
		.expect("Loopback configuration should validate.");
	let endpoint = ReqwestTokenEndpoint::from_config(ReqwestClient::new(), &config)
		.expect("Token endpoint should build from validated configuration.");
	let err = endpoint.fetch().await.expect_err("Closed ports should fail the fetch.");

	assert!(matches!(err, AcquisitionError::Network { .. }));
}

#[tokio::test]
async fn oversized_expiry_fails_the_round_as_malformed() {
	let server = MockServer::start_async().await;
	let endpoint = Arc::new(build_endpoint(&server));
	let (coordinator, store) = build_test_coordinator(endpoint, StdDuration::from_secs(5));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"abc\",\"expires_in\":999999999999}");
		})
		.await;
	let err = coordinator
		.ensure_credential()
		.await
		.expect_err("Unrepresentable expiries should fail the round.");

	assert!(matches!(err, AcquisitionError::MalformedResponse { status: 200, .. }));
	assert_eq!(coordinator.metrics().failures(), 1);
	assert!(store.current().is_none());

	mock.assert_async().await;
}
