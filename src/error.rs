//! Client-level error types shared across the queue, transport, and token providers.

// self
use crate::{_prelude::*, http::Method};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token acquisition failed; the client cannot authenticate.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure with no HTTP response (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Remote API answered with a non-2xx status.
	#[error(transparent)]
	Api(#[from] ApiError),

	/// A 2xx response body could not be parsed as JSON.
	#[error("Response from `{endpoint}` is not valid JSON.")]
	Decode {
		/// Endpoint that produced the body.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// A request body could not be serialized to JSON.
	#[error("Request body for `{endpoint}` could not be encoded as JSON.")]
	Encode {
		/// Endpoint the body was destined for.
		endpoint: String,
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// The request queue no longer accepts work.
	#[error("Request queue is closed.")]
	QueueClosed,
}

/// Non-2xx response returned by the remote API.
///
/// The body is kept as parsed JSON so callers can inspect provider-specific error payloads.
#[derive(Clone, Debug, ThisError)]
#[error("{method} `{endpoint}` failed with HTTP {status}.")]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Method of the failing request.
	pub method: Method,
	/// Endpoint of the failing request, relative to the base URL.
	pub endpoint: String,
	/// Parsed error body; a JSON string when the body is not JSON and `null` when it is blank.
	pub body: Value,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<Duration>,
}
impl ApiError {
	/// Returns `true` when the API rejected the call with HTTP 429.
	///
	/// The client never retries these; callers decide whether to back off using
	/// [`ApiError::retry_after`].
	pub fn is_rate_limited(&self) -> bool {
		self.status == 429
	}
}

/// Token acquisition failures raised by [`TokenProvider`](crate::provider::TokenProvider)
/// implementations.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Identity provider answered with a non-2xx status or an OAuth error payload.
	#[error("Identity provider rejected the token request: {message}.")]
	Rejected {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Provider- or client-supplied message summarizing the failure.
		message: String,
	},
	/// Identity provider could not be reached.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Identity provider answered 2xx with a body that does not contain a usable token.
	#[error("Identity provider returned a malformed token response.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: BoxError,
	},
	/// Local assertion signing failed.
	#[error("Token assertion could not be signed.")]
	Signing(#[from] jsonwebtoken::errors::Error),
}
impl AuthError {
	/// Wraps a parsing failure inside [`AuthError::MalformedResponse`].
	pub fn malformed(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::MalformedResponse { source: Box::new(src) }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URL cannot be parsed.
	#[error("`{field}` is not a valid URL.")]
	InvalidUrl {
		/// Configuration field name.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL cannot have relative endpoints joined onto it (e.g. `mailto:`).
	#[error("Base URL `{0}` cannot be used as an API root.")]
	CannotBeBase(String),
	/// Page path prefix must be absolute.
	#[error("Page path prefix `{0}` must start with `/`.")]
	RelativePagePrefix(String),
	/// Environment source could not be read or deserialized.
	#[error("Configuration could not be loaded.")]
	Load(#[from] ::config::ConfigError),
	/// Required configuration value is missing.
	#[error("Configuration value `{0}` is missing.")]
	Missing(String),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO) where no HTTP response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{url}`.")]
	Network {
		/// Target URL of the failed request.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		url: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}
