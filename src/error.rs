//! Gateway-level error types shared by the store, coordinator, and request gateway.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No credential could be obtained from the token endpoint.
	#[error(transparent)]
	Acquisition(#[from] AcquisitionError),
	/// Transport failure while talking to a business endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The business endpoint rejected the original credential and the refreshed one.
	#[error("Business endpoint rejected the credential {attempts} time(s); last status {status}.")]
	AuthenticationExhausted {
		/// Status code of the final rejection.
		status: u16,
		/// Number of credentials the request was sent with.
		attempts: u8,
	},
}
impl Error {
	/// Returns `true` when the request failed because no token could be acquired.
	pub fn is_acquisition_failure(&self) -> bool {
		matches!(self, Self::Acquisition(_))
	}

	/// Returns `true` when the business endpoint kept rejecting the credential.
	pub fn is_authentication_exhausted(&self) -> bool {
		matches!(self, Self::AuthenticationExhausted { .. })
	}
}

/// Token acquisition failures.
///
/// Every waiter of a failed acquisition round receives a clone of the same value, so sources are
/// shared behind [`Arc`].
#[derive(Clone, Debug, ThisError)]
pub enum AcquisitionError {
	/// The token endpoint was unreachable or did not answer in time.
	#[error("Token endpoint could not be reached.")]
	Network {
		/// Transport-specific failure (including timeouts).
		#[source]
		source: SharedError,
	},
	/// The token endpoint answered but declined to issue a token.
	#[error("Token endpoint rejected the request with status {status}: {reason}.")]
	Rejected {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Truncated response body.
		reason: String,
	},
	/// The token endpoint response could not be turned into a credential.
	#[error("Token endpoint returned a malformed response (status {status}).")]
	MalformedResponse {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Parsing or validation failure.
		#[source]
		source: SharedError,
	},
	/// The acquisition round was dropped before producing an outcome.
	#[error("Token acquisition was interrupted before it settled.")]
	Interrupted,
}
impl AcquisitionError {
	/// Wraps a network failure.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}

	/// Wraps a parsing or validation failure for a response with `status`.
	pub fn malformed(status: u16, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::MalformedResponse { status, source: Arc::new(src) }
	}

	/// Stable label used in spans and metrics.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Network { .. } => "network",
			Self::Rejected { .. } => "rejected",
			Self::MalformedResponse { .. } => "malformed_response",
			Self::Interrupted => "interrupted",
		}
	}
}

/// Configuration and validation failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Business request could not be built.
	#[error("Request could not be built.")]
	RequestBuild {
		/// Underlying builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot carry relative paths.
	#[error("Base URL cannot be used as a base: {url}.")]
	NotABaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// Endpoint must use HTTPS unless it points at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// A path could not be joined onto the base URL.
	#[error("Path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Resolved request URL points outside the base URL's origin.
	#[error("Path `{path}` resolves outside the base URL's origin.")]
	ForeignOrigin {
		/// Offending path.
		path: String,
	},
	/// API key was empty.
	#[error("API key cannot be empty.")]
	EmptyApiKey,
	/// API key header name is not a valid HTTP header name.
	#[error("`{name}` is not a valid header name.")]
	InvalidHeaderName {
		/// Offending header name.
		name: String,
	},
	/// API key contains characters that are not allowed in a header value.
	#[error("API key is not a valid header value.")]
	InvalidApiKey,
	/// Credential contains characters that are not allowed in a header value.
	#[error("Credential cannot be rendered as an Authorization header.")]
	InvalidCredentialHeader,
	/// A timeout was configured as zero.
	#[error("The {name} timeout must be greater than zero.")]
	ZeroTimeout {
		/// Which timeout failed validation.
		name: &'static str,
	},
	/// Rejection status list is empty or contains a non-error status.
	#[error("Rejection statuses must be a non-empty list of 4xx/5xx codes.")]
	InvalidRejectionStatuses,
	/// Environment variable is missing.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// Environment variable holds an unparsable value.
	#[error("Environment variable `{name}` has an invalid value.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a request builder failure inside [`ConfigError`].
	pub fn request_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::RequestBuild { source: Box::new(src) }
	}
}

/// Transport-level failures while calling business endpoints.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the business endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
