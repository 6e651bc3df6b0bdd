//! Client-level error types shared across token management, request execution, and streaming.

// self
use crate::{_prelude::*, rate_limit::Category};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential could not be obtained or was rejected.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Remote API returned a non-success status that is not retried.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Transport failure (DNS, TCP, TLS, timeouts) after bounded retries.
	#[error(transparent)]
	Network(#[from] NetworkError),
	/// Response body did not match the expected shape.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Server kept answering 429 after the bounded retry budget was spent.
	#[error("Rate limit for the {category} category stayed exhausted after {attempts} attempts.")]
	RateLimitExceeded {
		/// Category whose quota was exhausted.
		category: Category,
		/// Number of requests sent before giving up.
		attempts: u32,
		/// Last Retry-After hint supplied by the server.
		retry_after: Option<Duration>,
	},
	/// Streaming connection could not be re-established.
	#[error("Stream `{target}` disconnected after {attempts} reconnect attempts: {reason}.")]
	StreamDisconnected {
		/// Path of the streaming endpoint.
		target: String,
		/// Number of reconnect attempts made.
		attempts: u32,
		/// Last observed failure.
		reason: String,
	},
	/// Caller supplied arguments the API cannot accept.
	#[error("Request is invalid: {reason}.")]
	InvalidRequest {
		/// Human-readable reason string.
		reason: String,
	},
	/// The configured number of physical stream connections is already open.
	#[error("Maximum of {limit} concurrent streams is already open.")]
	StreamLimit {
		/// Configured connection cap.
		limit: usize,
	},
	/// The client session has been closed.
	#[error("Client session has been closed.")]
	SessionClosed,
}

/// Failures raised while acquiring or applying bearer credentials.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// Token endpoint rejected the refresh token.
	#[error("Token endpoint rejected the refresh token: {reason}.")]
	InvalidGrant {
		/// Server-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Server-supplied reason string.
		reason: String,
	},
	/// No refresh token has been configured or issued.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// Token endpoint answered with a body that cannot be turned into a credential.
	#[error("Token endpoint returned a malformed response: {reason}.")]
	MalformedResponse {
		/// Description of the malformed field.
		reason: String,
	},
	/// Transient failures persisted across every refresh attempt.
	#[error("Token refresh failed after {attempts} attempts: {message}.")]
	RefreshFailed {
		/// Number of exchanges attempted.
		attempts: u32,
		/// Summary of the last failure.
		message: String,
		/// HTTP status of the last failure, when available.
		status: Option<u16>,
	},
	/// The API answered 401 again after a forced refresh.
	#[error("Request was rejected with 401 even after a forced token refresh.")]
	Unauthorized,
	/// Session shut down while the refresh was pending.
	#[error("Token refresh was cancelled because the session closed.")]
	Cancelled,
}

/// Non-success response that is surfaced to the caller without retry.
#[derive(Clone, Debug, ThisError)]
#[error("API request failed with status {status}: {message}.")]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Message extracted from the response body or the canonical status reason.
	pub message: String,
	/// Raw response body.
	pub body: String,
}
impl ApiError {
	const MESSAGE_KEYS: [&str; 4] = ["Message", "message", "error_description", "error"];

	/// Builds an error from a status and raw body, extracting the most specific message.
	pub fn from_response(status: u16, body: &[u8]) -> Self {
		let body = String::from_utf8_lossy(body).into_owned();
		let message = serde_json::from_str::<serde_json::Value>(&body)
			.ok()
			.and_then(|value| {
				Self::MESSAGE_KEYS
					.iter()
					.find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_owned))
			})
			.filter(|message| !message.trim().is_empty())
			.unwrap_or_else(|| {
				reqwest::StatusCode::from_u16(status)
					.ok()
					.and_then(|code| code.canonical_reason())
					.unwrap_or("Unknown status")
					.to_owned()
			});
		let message = message.trim().trim_end_matches('.').to_owned();

		Self { status, message, body }
	}

	/// Returns `true` for 404 responses.
	pub fn is_not_found(&self) -> bool {
		self.status == 404
	}

	/// Returns `true` for 400 responses.
	pub fn is_bad_request(&self) -> bool {
		self.status == 400
	}

	/// Returns `true` for 5xx responses.
	pub fn is_server_error(&self) -> bool {
		(500..600).contains(&self.status)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum NetworkError {
	/// Underlying HTTP client reported a failure on every attempt.
	#[error("Network error occurred after {attempts} attempts.")]
	Transport {
		/// Number of attempts made.
		attempts: u32,
		/// Transport-specific network error of the last attempt.
		#[source]
		source: BoxError,
	},
}
impl NetworkError {
	/// Wraps a transport-specific network error.
	pub fn transport(attempts: u32, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { attempts, source: Box::new(src) }
	}
}

/// A response body failed typed validation.
#[derive(Debug, ThisError)]
#[error("Response body does not match the expected shape at `{}`.", source.path())]
pub struct ValidationError {
	/// Structured parsing failure, including the JSON path that failed.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
	/// HTTP status of the response, when it came from one.
	pub status: Option<u16>,
}
impl ValidationError {
	/// Deserializes `bytes` into `T`, recording the failing path on error.
	pub fn parse<T>(bytes: &[u8], status: Option<u16>) -> Result<T, Self>
	where
		T: serde::de::DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut de).map_err(|source| Self { source, status })
	}

	/// Deserializes an already parsed JSON value into `T`.
	pub fn from_value<T>(value: serde_json::Value) -> Result<T, Self>
	where
		T: serde::de::DeserializeOwned,
	{
		serde_path_to_error::deserialize(value).map_err(|source| Self { source, status: None })
	}
}

/// Configuration failures raised while building a session.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URL cannot be parsed or joined.
	#[error("Configured URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Client identifier is empty or missing.
	#[error("Client ID is required.")]
	MissingClientId,
	/// Environment variable or field for the trading environment is missing.
	#[error("Environment must be specified as `Simulation` or `Live`.")]
	MissingEnvironment,
	/// Environment value is not recognized.
	#[error("Environment `{value}` is not recognized; use `Simulation` or `Live`.")]
	UnknownEnvironment {
		/// Raw value supplied.
		value: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}
