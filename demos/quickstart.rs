//! Demonstrates sharing one bearer credential across concurrent requests and recovering from a
//! rejected token with a single refresh.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use bearer_gateway::{config::GatewayConfig, credential::Credential, gateway::Gateway, url::Url};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/interface/v1/access_token").header("Api-Key", "demo-key");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"expires_in\":900}");
		})
		.await;
	let stale_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/interface/v1/guests")
				.header("Authorization", "Bearer revoked-elsewhere");
			then.status(401);
		})
		.await;
	let guests_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/interface/v1/guests")
				.header("Authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let config = GatewayConfig::builder(Url::parse(&server.url("/interface/v1"))?, "demo-key")
		.token_param("corporate_id", "10")
		.build()?;
	let gateway = Gateway::new(config)?;

	// Pretend a previous process left behind a token the server no longer accepts.
	gateway.store().replace(Credential::new("revoked-elsewhere"));

	let response = gateway.send(gateway.get("/guests")?).await?;

	println!("First request recovered from a rejected token with {}.", response.status());

	let mut handles = Vec::new();

	for _ in 0..8 {
		let gateway = gateway.clone();

		handles.push(tokio::spawn(async move {
			let builder = gateway.get("/guests")?;

			gateway.send(builder).await
		}));
	}
	for handle in handles {
		let response = handle.await??;

		println!("Guests request finished with {}.", response.status());
	}

	println!(
		"Acquisition rounds: {}, joined waiters: {}.",
		gateway.coordinator().metrics().rounds(),
		gateway.coordinator().metrics().joined()
	);

	token_mock.assert_calls_async(1).await;
	stale_mock.assert_async().await;
	guests_mock.assert_calls_async(9).await;

	Ok(())
}
