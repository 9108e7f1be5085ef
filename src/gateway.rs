//! Caller-facing HTTP client that attaches the shared bearer credential to every request.
//!
//! [`Gateway`] asks the coordinator for a credential before sending, sets
//! `Authorization: Bearer <token>`, and passes the response through untouched unless its status
//! is a configured rejection status. On rejection it invalidates the credential it used and
//! replays the request once with a freshly acquired one; a second rejection ends the request with
//! [`Error::AuthenticationExhausted`].

// crates.io
use reqwest::{
	Method, Request, RequestBuilder, Response,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	coordinator::AcquisitionCoordinator,
	credential::Credential,
	endpoint::{ReqwestTokenEndpoint, TokenEndpoint},
	error::{ConfigError, TransportError},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

/// Gateway specialized for the crate's reqwest token endpoint.
pub type ReqwestGateway = Gateway<ReqwestTokenEndpoint>;

/// Authenticated HTTP client shared by every caller of the application.
pub struct Gateway<E = ReqwestTokenEndpoint>
where
	E: ?Sized + TokenEndpoint,
{
	http_client: ReqwestClient,
	config: Arc<GatewayConfig>,
	coordinator: AcquisitionCoordinator<E>,
}
impl Gateway<ReqwestTokenEndpoint> {
	/// Builds the HTTP client, token endpoint, store, and coordinator from `config`.
	///
	/// The HTTP client applies the configured per-request timeout and defaults the content type
	/// to JSON; the same client is used for the token endpoint.
	pub fn new(config: GatewayConfig) -> Result<Self> {
		config.validate()?;

		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		let http_client = ReqwestClient::builder()
			.timeout(config.request_timeout)
			.default_headers(headers)
			.build()
			.map_err(ConfigError::http_client_build)?;
		let endpoint = Arc::new(ReqwestTokenEndpoint::from_config(http_client.clone(), &config)?);
		let coordinator = AcquisitionCoordinator::new(
			endpoint,
			Arc::new(TokenStore::default()),
			config.acquisition_timeout,
		);

		Self::with_parts(http_client, config, coordinator)
	}
}
impl<E> Gateway<E>
where
	E: ?Sized + TokenEndpoint,
{
	/// Assembles a gateway from caller-provided parts after validating `config`.
	pub fn with_parts(
		http_client: ReqwestClient,
		config: GatewayConfig,
		coordinator: AcquisitionCoordinator<E>,
	) -> Result<Self> {
		config.validate()?;

		Ok(Self { http_client, config: Arc::new(config), coordinator })
	}

	/// Coordinator shared by every request of this gateway.
	pub fn coordinator(&self) -> &AcquisitionCoordinator<E> {
		&self.coordinator
	}

	/// Token store shared by every request of this gateway.
	pub fn store(&self) -> &Arc<TokenStore> {
		self.coordinator.store()
	}

	/// Active configuration.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Starts a request for `path`, resolved against the configured base URL.
	pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
		let url = self.config.resolve(path)?;

		Ok(self.http_client.request(method, url))
	}

	/// Starts a `GET` request for `path`.
	pub fn get(&self, path: &str) -> Result<RequestBuilder> {
		self.request(Method::GET, path)
	}

	/// Starts a `POST` request for `path`.
	pub fn post(&self, path: &str) -> Result<RequestBuilder> {
		self.request(Method::POST, path)
	}

	/// Builds and executes `builder` with the shared credential attached.
	pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
		let request = builder.build().map_err(ConfigError::request_build)?;

		self.execute(request).await
	}

	/// Executes `request` with the shared credential attached, retrying once on rejection.
	///
	/// Requests with streaming bodies cannot be replayed; a rejection of such a request fails
	/// immediately with [`Error::AuthenticationExhausted`].
	pub async fn execute(&self, request: Request) -> Result<Response> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "execute");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.execute_with_retry(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn execute_with_retry(&self, request: Request) -> Result<Response> {
		let replay = request.try_clone();

		self.execute_with_replay(request, replay).await
	}

	/// Sends `request`; `replay` is the copy used for the single retry, if the body allows one.
	async fn execute_with_replay(
		&self,
		request: Request,
		replay: Option<Request>,
	) -> Result<Response> {
		let credential = self.coordinator.ensure_credential().await?;
		let response = self.dispatch(request, &credential).await?;

		if !self.config.is_rejection(response.status()) {
			return Ok(response);
		}

		let status = response.status().as_u16();

		obs::credential_rejected(status, 1);
		obs::record_credential_rejected(status, 1);
		self.coordinator.invalidate(&credential);

		let Some(replay) = replay else {
			return Err(Error::AuthenticationExhausted { status, attempts: 1 });
		};
		let refreshed = self.coordinator.ensure_credential().await?;
		let response = self.dispatch(replay, &refreshed).await?;

		if !self.config.is_rejection(response.status()) {
			return Ok(response);
		}

		let status = response.status().as_u16();

		obs::credential_rejected(status, 2);
		obs::record_credential_rejected(status, 2);
		self.coordinator.invalidate(&refreshed);

		Err(Error::AuthenticationExhausted { status, attempts: 2 })
	}

	async fn dispatch(&self, mut request: Request, credential: &Credential) -> Result<Response> {
		let header = credential.authorization_header().ok_or(ConfigError::InvalidCredentialHeader)?;

		request.headers_mut().insert(AUTHORIZATION, header);

		Ok(self.http_client.execute(request).await.map_err(TransportError::from)?)
	}
}
impl<E> Clone for Gateway<E>
where
	E: ?Sized + TokenEndpoint,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			config: self.config.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<E> Debug for Gateway<E>
where
	E: ?Sized + TokenEndpoint,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}
