//! `refresh_token` grant facade over the `oauth2` crate.
//!
//! [`RefreshFacade`] performs one exchange and classifies failures into
//! [`ExchangeFailure::Fatal`] (surface immediately) or [`ExchangeFailure::Transient`] (retry
//! with backoff). Retrying itself is the token manager's job.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	config::ClientConfig,
	error::{AuthError, ConfigError},
	http::{self, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

type RefreshClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeTokenResponse = oauth2::basic::BasicTokenResponse;

/// Outcome of a failed exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ExchangeFailure {
	/// Retrying cannot help.
	Fatal(AuthError),
	/// Temporary failure; safe to retry.
	Transient { message: String, status: Option<u16>, retry_after: Option<Duration> },
}

pub(crate) struct RefreshFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	oauth_client: RefreshClient,
	http_client: Arc<C>,
}
impl<C> RefreshFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Client secrets travel in the form body alongside `client_id`.
	pub(crate) fn new(
		config: &ClientConfig,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(config.token_endpoint()?.to_string())?;
		let mut oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		if let Some(secret) = &config.client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.clone()));
		}

		Ok(Self { oauth_client, http_client: http_client.into() })
	}

	/// Exchanges `refresh_token` for a new credential.
	///
	/// When the response carries no (or a blank) rotated refresh token, the presented one is
	/// kept on the returned credential.
	pub(crate) async fn refresh(
		&self,
		refresh_token: &TokenSecret,
		safety_margin: Duration,
	) -> Result<Credential, ExchangeFailure> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let secret = RefreshToken::new(refresh_token.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&secret)
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err))?;

		map_refresh_response(response, refresh_token, safety_margin)
	}
}

fn map_refresh_response(
	response: FacadeTokenResponse,
	presented: &TokenSecret,
	safety_margin: Duration,
) -> Result<Credential, ExchangeFailure> {
	let expires_in = response.expires_in().ok_or_else(|| malformed("expires_in is missing"))?;
	let expires_in = i64::try_from(expires_in.as_secs())
		.map_err(|_| malformed("expires_in exceeds the supported range"))?;

	if expires_in <= 0 {
		return Err(malformed("expires_in must be positive"));
	}

	let refresh = response
		.refresh_token()
		.map(|token| TokenSecret::new(token.secret().to_owned()))
		.filter(|token| !token.is_blank())
		.unwrap_or_else(|| presented.clone());

	Credential::builder()
		.access_token(response.access_token().secret().to_owned())
		.refresh_secret(refresh)
		.issued_now()
		.expires_in(Duration::seconds(expires_in))
		.safety_margin(safety_margin)
		.build()
		.map_err(|err| malformed(err.to_string().trim_end_matches('.')))
}

fn map_request_error<E>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> ExchangeFailure
where
	E: 'static + Send + Sync + StdError,
{
	let status = meta.as_ref().and_then(|value| value.status);
	let retry_after = meta.as_ref().and_then(|value| value.retry_after);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(response, status, retry_after),
		RequestTokenError::Request(error) => map_transport_error(error, status, retry_after),
		RequestTokenError::Parse(error, _body) =>
			if status.is_some_and(http::is_transient_status) {
				ExchangeFailure::Transient {
					message: format!(
						"Token endpoint returned an unparsable {} body",
						status.unwrap_or_default()
					),
					status,
					retry_after,
				}
			} else {
				ExchangeFailure::Fatal(AuthError::MalformedResponse { reason: format!("{error}") })
			},
		RequestTokenError::Other(message) =>
			if status.is_none_or(http::is_transient_status) {
				ExchangeFailure::Transient { message, status, retry_after }
			} else {
				ExchangeFailure::Fatal(AuthError::RefreshFailed { attempts: 1, message, status })
			},
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> ExchangeFailure {
	let code = response.error().as_ref().to_owned();
	let reason = response
		.error_description()
		.map(|description| description.trim().trim_end_matches('.').to_owned())
		.filter(|description| !description.is_empty())
		.unwrap_or_else(|| code.clone());

	match response.error() {
		BasicErrorResponseType::InvalidGrant =>
			ExchangeFailure::Fatal(AuthError::InvalidGrant { reason }),
		BasicErrorResponseType::InvalidClient | BasicErrorResponseType::UnauthorizedClient =>
			ExchangeFailure::Fatal(AuthError::InvalidClient { reason }),
		_ if status.is_some_and(http::is_transient_status)
			|| matches!(code.as_str(), "server_error" | "temporarily_unavailable") =>
			ExchangeFailure::Transient { message: reason, status, retry_after },
		_ => ExchangeFailure::Fatal(AuthError::RefreshFailed {
			attempts: 1,
			message: reason,
			status,
		}),
	}
}

fn map_transport_error<E>(
	err: HttpClientError<E>,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> ExchangeFailure
where
	E: 'static + Send + Sync + StdError,
{
	let message = match err {
		HttpClientError::Http(inner) =>
			return ExchangeFailure::Fatal(AuthError::RefreshFailed {
				attempts: 1,
				message: format!("Token request could not be built: {inner}"),
				status,
			}),
		HttpClientError::Reqwest(inner) => format!("Transport error: {inner}"),
		HttpClientError::Io(inner) => format!("I/O error: {inner}"),
		HttpClientError::Other(message) => format!("HTTP client error: {message}"),
		_ => "Unknown HTTP client error".to_owned(),
	};

	ExchangeFailure::Transient { message, status, retry_after }
}

fn malformed(reason: &str) -> ExchangeFailure {
	ExchangeFailure::Fatal(AuthError::MalformedResponse { reason: reason.to_owned() })
}
