//! Token endpoint contract and the reqwest-backed implementation.
//!
//! The coordinator only depends on [`TokenEndpoint`]; it never sees HTTP details. Implementations
//! map every failure mode into [`AcquisitionError`] so a failed round can be fanned out to all of
//! its waiters unchanged.

// crates.io
use reqwest::{
	StatusCode,
	header::{ACCEPT, CONTENT_TYPE, HeaderName, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	credential::Credential,
	error::{AcquisitionError, ConfigError},
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Boxed future returned by [`TokenEndpoint::fetch`].
pub type TokenFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Credential, AcquisitionError>> + 'a + Send>>;

/// Source of fresh bearer credentials.
///
/// Implementations must be `Send + Sync + 'static` so the coordinator can drive a fetch on a
/// detached task that outlives any individual caller.
pub trait TokenEndpoint
where
	Self: 'static + Send + Sync,
{
	/// Requests a new credential.
	fn fetch(&self) -> TokenFuture<'_>;
}

/// Token endpoint that posts the API key to `{base_url}/{token_path}`.
#[derive(Clone)]
pub struct ReqwestTokenEndpoint {
	client: ReqwestClient,
	url: Url,
	api_key_header: HeaderName,
	api_key: HeaderValue,
	params: Vec<(String, String)>,
}
impl ReqwestTokenEndpoint {
	/// Builds an endpoint from validated configuration, reusing `client` for transport.
	pub fn from_config(client: ReqwestClient, config: &GatewayConfig) -> Result<Self, ConfigError> {
		let url = config.token_endpoint()?;
		let api_key_header = HeaderName::from_bytes(config.api_key_header.as_bytes())
			.map_err(|_| ConfigError::InvalidHeaderName { name: config.api_key_header.clone() })?;
		let mut api_key =
			HeaderValue::from_str(config.api_key.expose()).map_err(|_| ConfigError::InvalidApiKey)?;
		let params = config.token_params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

		api_key.set_sensitive(true);

		Ok(Self { client, url, api_key_header, api_key, params })
	}

	/// Absolute token endpoint URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	async fn request_credential(&self) -> Result<Credential, AcquisitionError> {
		let response = self
			.client
			.post(self.url.clone())
			.query(&self.params)
			.header(self.api_key_header.clone(), self.api_key.clone())
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.send()
			.await
			.map_err(AcquisitionError::network)?;
		let status = response.status();
		let body = response.bytes().await.map_err(AcquisitionError::network)?;

		if !status.is_success() {
			return Err(AcquisitionError::Rejected {
				status: status.as_u16(),
				reason: body_preview(&body),
			});
		}

		parse_token_response(status, &body)
	}
}
impl TokenEndpoint for ReqwestTokenEndpoint {
	fn fetch(&self) -> TokenFuture<'_> {
		Box::pin(self.request_credential())
	}
}
impl Debug for ReqwestTokenEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestTokenEndpoint")
			.field("url", &self.url.as_str())
			.field("api_key_header", &self.api_key_header)
			.field("params", &self.params)
			.finish()
	}
}

/// Payload accepted from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
	#[serde(alias = "token")]
	access_token: String,
	#[serde(default)]
	expires_in: Option<i64>,
}

/// Validation failures raised after the payload parsed.
#[derive(Debug, ThisError)]
enum TokenPayloadError {
	#[error("The access_token field is empty.")]
	EmptyToken,
	#[error("The access_token field cannot be sent in an Authorization header.")]
	UnsendableToken,
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	#[error("The expires_in value {0} overflows the representable expiry range.")]
	ExpiresInOutOfRange(i64),
}

fn parse_token_response(status: StatusCode, body: &[u8]) -> Result<Credential, AcquisitionError> {
	let code = status.as_u16();
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let payload: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| AcquisitionError::malformed(code, e))?;

	if payload.access_token.trim().is_empty() {
		return Err(AcquisitionError::malformed(code, TokenPayloadError::EmptyToken));
	}

	let mut credential = Credential::new(payload.access_token).issued_now();

	if credential.authorization_header().is_none() {
		return Err(AcquisitionError::malformed(code, TokenPayloadError::UnsendableToken));
	}

	if let Some(expires_in) = payload.expires_in {
		if expires_in <= 0 {
			return Err(AcquisitionError::malformed(code, TokenPayloadError::NonPositiveExpiresIn));
		}

		credential = credential.checked_expires_in(Duration::seconds(expires_in)).ok_or_else(|| {
			AcquisitionError::malformed(code, TokenPayloadError::ExpiresInOutOfRange(expires_in))
		})?;
	}

	Ok(credential)
}

fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return "empty response body".into();
	}

	trimmed.chars().take(BODY_PREVIEW_LIMIT).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_access_token_and_expiry() {
		let credential =
			parse_token_response(StatusCode::OK, br#"{"access_token":"abc123","expires_in":60}"#)
				.expect("Well-formed payload should parse.");

		assert_eq!(credential.token.expose(), "abc123");
		assert!(credential.issued_at.is_some());
		assert_eq!(
			credential.expires_at.zip(credential.issued_at).map(|(exp, iss)| exp - iss),
			Some(Duration::seconds(60))
		);
	}

	#[test]
	fn accepts_token_alias_without_expiry() {
		let credential = parse_token_response(StatusCode::OK, br#"{"token":"abc123"}"#)
			.expect("Aliased payload should parse.");

		assert_eq!(credential.token.expose(), "abc123");
		assert!(credential.expires_at.is_none());
	}

	#[test]
	fn malformed_payloads_name_the_failure() {
		let err = parse_token_response(StatusCode::OK, br#"{"access_token":42}"#)
			.expect_err("Numeric tokens should be rejected.");

		match err {
			AcquisitionError::MalformedResponse { status, source } => {
				assert_eq!(status, 200);
				assert!(source.to_string().contains("access_token"));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}

		for body in [
			&br#"{"access_token":"  "}"#[..],
			&br#"{"access_token":"abc","expires_in":0}"#[..],
			&b"not json"[..],
		] {
			let err = parse_token_response(StatusCode::OK, body)
				.expect_err("Invalid payloads should be rejected.");

			assert!(matches!(err, AcquisitionError::MalformedResponse { .. }));
		}
	}

	#[test]
	fn oversized_expires_in_is_malformed_not_a_panic() {
		let err = parse_token_response(
			StatusCode::OK,
			br#"{"access_token":"abc","expires_in":999999999999}"#,
		)
		.expect_err("Expiry overflow should be rejected.");

		match err {
			AcquisitionError::MalformedResponse { status, source } => {
				assert_eq!(status, 200);
				assert!(source.to_string().contains("999999999999"));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn body_preview_truncates_and_labels_empty_bodies() {
		assert_eq!(body_preview(b"  "), "empty response body");
		assert_eq!(body_preview("x".repeat(1000).as_bytes()).len(), BODY_PREVIEW_LIMIT);
	}
}
