//! Externally supplied gateway configuration with validation.
//!
//! Values come from [`GatewayConfigBuilder`], from `BEARER_GATEWAY_*` environment variables via
//! [`GatewayConfig::from_env`], or from any serde source (timeouts expressed in milliseconds).

// crates.io
use reqwest::{
	StatusCode,
	header::{HeaderName, HeaderValue},
};
use url::Host;
// self
use crate::{_prelude::*, credential::Secret, error::ConfigError};

const DEFAULT_TOKEN_PATH: &str = "access_token";
const DEFAULT_API_KEY_HEADER: &str = "Api-Key";
const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(10);

const ENV_BASE_URL: &str = "BEARER_GATEWAY_BASE_URL";
const ENV_API_KEY: &str = "BEARER_GATEWAY_API_KEY";
const ENV_API_KEY_HEADER: &str = "BEARER_GATEWAY_API_KEY_HEADER";
const ENV_TOKEN_PATH: &str = "BEARER_GATEWAY_TOKEN_PATH";
const ENV_REQUEST_TIMEOUT_MS: &str = "BEARER_GATEWAY_REQUEST_TIMEOUT_MS";
const ENV_ACQUISITION_TIMEOUT_MS: &str = "BEARER_GATEWAY_ACQUISITION_TIMEOUT_MS";
const ENV_TOKEN_PARAMS: &str = "BEARER_GATEWAY_TOKEN_PARAMS";
const ENV_REJECTION_STATUSES: &str = "BEARER_GATEWAY_REJECTION_STATUSES";

#[derive(Debug, ThisError)]
enum EnvFormatError {
	#[error("Expected `key=value` but found `{0}`.")]
	MalformedPair(String),
}

/// Validated gateway configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// Base address shared by the token endpoint and business endpoints.
	pub base_url: Url,
	/// Token endpoint path relative to `base_url`.
	#[serde(default = "default_token_path")]
	pub token_path: String,
	/// API key presented to the token endpoint.
	pub api_key: Secret,
	/// Header carrying the API key.
	#[serde(default = "default_api_key_header")]
	pub api_key_header: String,
	/// Extra query parameters sent to the token endpoint.
	#[serde(default)]
	pub token_params: BTreeMap<String, String>,
	/// Per-request timeout applied to every HTTP call.
	#[serde(default = "default_timeout", rename = "request_timeout_ms", with = "millis")]
	pub request_timeout: StdDuration,
	/// Upper bound for a whole acquisition round.
	#[serde(default = "default_timeout", rename = "acquisition_timeout_ms", with = "millis")]
	pub acquisition_timeout: StdDuration,
	/// Business response statuses treated as credential rejection.
	#[serde(default = "default_rejection_statuses")]
	pub rejection_statuses: Vec<u16>,
}
impl GatewayConfig {
	/// Creates a builder seeded with the required values.
	pub fn builder(base_url: Url, api_key: impl Into<String>) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(base_url, api_key)
	}

	/// Loads configuration from `BEARER_GATEWAY_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads configuration through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let required = |name: &'static str| lookup(name).ok_or(ConfigError::MissingEnv { name });
		let base_url = Url::parse(&required(ENV_BASE_URL)?)
			.map_err(|e| ConfigError::InvalidEnv { name: ENV_BASE_URL, source: Box::new(e) })?;
		let mut builder = Self::builder(base_url, required(ENV_API_KEY)?);

		if let Some(header) = lookup(ENV_API_KEY_HEADER) {
			builder = builder.api_key_header(header);
		}
		if let Some(path) = lookup(ENV_TOKEN_PATH) {
			builder = builder.token_path(path);
		}
		if let Some(timeout) = parse_millis(&lookup, ENV_REQUEST_TIMEOUT_MS)? {
			builder = builder.request_timeout(timeout);
		}
		if let Some(timeout) = parse_millis(&lookup, ENV_ACQUISITION_TIMEOUT_MS)? {
			builder = builder.acquisition_timeout(timeout);
		}
		if let Some(raw) = lookup(ENV_TOKEN_PARAMS) {
			for (key, value) in parse_pairs(&raw, ENV_TOKEN_PARAMS)? {
				builder = builder.token_param(key, value);
			}
		}
		if let Some(raw) = lookup(ENV_REJECTION_STATUSES) {
			builder = builder.rejection_statuses(parse_statuses(&raw, ENV_REJECTION_STATUSES)?);
		}

		builder.build()
	}

	/// Resolves the absolute token endpoint URL.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.token_path)
	}

	/// Resolves `path` against the base URL; leading slashes stay relative to the base path.
	///
	/// Absolute inputs are accepted only when they share the base URL's origin, so the bearer
	/// credential is never sent to another host.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let relative = path.trim_start_matches('/');
		let url = base_with_trailing_slash(&self.base_url)
			.join(relative)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })?;

		if url.origin() != self.base_url.origin() {
			return Err(ConfigError::ForeignOrigin { path: path.to_owned() });
		}

		Ok(url)
	}

	/// Returns `true` if `status` counts as a credential rejection.
	pub fn is_rejection(&self, status: StatusCode) -> bool {
		self.rejection_statuses.contains(&status.as_u16())
	}

	/// Validates invariants for the configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::NotABaseUrl { url: self.base_url.to_string() });
		}

		validate_endpoint("base", &self.base_url)?;
		validate_endpoint("token", &self.token_endpoint()?)?;

		if self.api_key.is_blank() {
			return Err(ConfigError::EmptyApiKey);
		}
		if HeaderName::from_bytes(self.api_key_header.as_bytes()).is_err() {
			return Err(ConfigError::InvalidHeaderName { name: self.api_key_header.clone() });
		}
		if HeaderValue::from_str(self.api_key.expose()).is_err() {
			return Err(ConfigError::InvalidApiKey);
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout { name: "request" });
		}
		if self.acquisition_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout { name: "acquisition" });
		}
		if self.rejection_statuses.is_empty()
			|| self.rejection_statuses.iter().any(|status| !(400..600).contains(status))
		{
			return Err(ConfigError::InvalidRejectionStatuses);
		}

		Ok(())
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	config: GatewayConfig,
}
impl GatewayConfigBuilder {
	/// Creates a new builder with default paths, header, and timeouts.
	pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
		Self {
			config: GatewayConfig {
				base_url,
				token_path: default_token_path(),
				api_key: Secret::new(api_key),
				api_key_header: default_api_key_header(),
				token_params: BTreeMap::new(),
				request_timeout: DEFAULT_TIMEOUT,
				acquisition_timeout: DEFAULT_TIMEOUT,
				rejection_statuses: default_rejection_statuses(),
			},
		}
	}

	/// Overrides the token endpoint path (defaults to `access_token`).
	pub fn token_path(mut self, path: impl Into<String>) -> Self {
		self.config.token_path = path.into();

		self
	}

	/// Overrides the API key header (defaults to `Api-Key`).
	pub fn api_key_header(mut self, name: impl Into<String>) -> Self {
		self.config.api_key_header = name.into();

		self
	}

	/// Adds a query parameter sent with every token request.
	pub fn token_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.config.token_params.insert(key.into(), value.into());

		self
	}

	/// Overrides the per-request timeout (defaults to 10 seconds).
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.config.request_timeout = timeout;

		self
	}

	/// Overrides the acquisition round timeout (defaults to 10 seconds).
	pub fn acquisition_timeout(mut self, timeout: StdDuration) -> Self {
		self.config.acquisition_timeout = timeout;

		self
	}

	/// Replaces the statuses treated as credential rejection (defaults to `[401]`).
	pub fn rejection_statuses<I>(mut self, statuses: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.config.rejection_statuses = statuses.into_iter().collect();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

mod millis {
	// self
	use super::*;

	pub(super) fn serialize<S>(value: &StdDuration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<StdDuration, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(StdDuration::from_millis)
	}
}

fn default_token_path() -> String {
	DEFAULT_TOKEN_PATH.into()
}

fn default_api_key_header() -> String {
	DEFAULT_API_KEY_HEADER.into()
}

fn default_timeout() -> StdDuration {
	DEFAULT_TIMEOUT
}

fn default_rejection_statuses() -> Vec<u16> {
	vec![StatusCode::UNAUTHORIZED.as_u16()]
}

fn parse_millis<F>(lookup: &F, name: &'static str) -> Result<Option<StdDuration>, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(name)
		.map(|raw| {
			raw.trim()
				.parse::<u64>()
				.map(StdDuration::from_millis)
				.map_err(|e| ConfigError::InvalidEnv { name, source: Box::new(e) })
		})
		.transpose()
}

/// Parses `key=value` pairs separated by commas.
fn parse_pairs(raw: &str, name: &'static str) -> Result<Vec<(String, String)>, ConfigError> {
	raw.split(',')
		.map(str::trim)
		.filter(|pair| !pair.is_empty())
		.map(|pair| match pair.split_once('=') {
			Some((key, value)) if !key.trim().is_empty() =>
				Ok((key.trim().to_owned(), value.trim().to_owned())),
			_ => Err(ConfigError::InvalidEnv {
				name,
				source: Box::new(EnvFormatError::MalformedPair(pair.to_owned())),
			}),
		})
		.collect()
}

fn parse_statuses(raw: &str, name: &'static str) -> Result<Vec<u16>, ConfigError> {
	raw.split(',')
		.map(str::trim)
		.filter(|status| !status.is_empty())
		.map(|status| {
			status.parse::<u16>().map_err(|e| ConfigError::InvalidEnv { name, source: Box::new(e) })
		})
		.collect()
}

fn base_with_trailing_slash(base: &Url) -> Url {
	let mut base = base.clone();

	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	let loopback = match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(addr)) => addr.is_loopback(),
		Some(Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	};

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}
