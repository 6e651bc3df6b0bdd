//! Authenticated, quota-aware REST execution.
//!
//! [`RequestExecutor::execute`] runs every call through the same loop:
//!
//! 1. wait for a rate-limit slot in the request's category;
//! 2. obtain a valid credential and attach it;
//! 3. send and read the body;
//! 4. 2xx → record quota headers and return;
//! 5. 401 → force one refresh and retry once, a second 401 is an [`AuthError::Unauthorized`];
//! 6. 429 → close the bucket for Retry-After and retry through step 1, bounded;
//! 7. any other status → [`ApiError`] without retry;
//! 8. network failure → exponential backoff retry, bounded.

mod request;
mod response;

pub use request::RequestDescriptor;
pub use response::ApiResponse;

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::{
	StatusCode,
	header::{ACCEPT, CONTENT_TYPE, HeaderMap},
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSource},
	config::RetryConfig,
	error::{ApiError, AuthError, ConfigError, NetworkError},
	http,
	obs::{self, OpKind, OpOutcome, OpSpan},
	rate_limit::RateLimiter,
};

/// Executes [`RequestDescriptor`]s against the API host.
pub struct RequestExecutor {
	http: ReqwestClient,
	base_url: Url,
	tokens: Arc<dyn TokenSource>,
	limiter: Arc<RateLimiter>,
	retry: RetryConfig,
	timeout: Option<StdDuration>,
	cancel: CancellationToken,
}
impl RequestExecutor {
	/// Creates an executor sharing `tokens` and `limiter` with the rest of the session.
	pub fn new(
		http: ReqwestClient,
		base_url: Url,
		tokens: Arc<dyn TokenSource>,
		limiter: Arc<RateLimiter>,
		retry: RetryConfig,
	) -> Self {
		Self {
			http,
			base_url,
			tokens,
			limiter,
			retry,
			timeout: None,
			cancel: CancellationToken::new(),
		}
	}

	/// Aborts pending waits and sends with [`Error::SessionClosed`] once `cancel` fires.
	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;

		self
	}

	/// Bounds each attempt (connect, send and body read) by `timeout`.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Shared rate limiter.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Executes `request`, returning the successful response.
	pub async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
		let span = OpSpan::new(OpKind::Request, "execute");

		obs::record_op_outcome(OpKind::Request, OpOutcome::Attempt);

		let result = span.instrument(self.run(request)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(OpKind::Request, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(OpKind::Request, OpOutcome::Failure),
		}

		result
	}

	/// Executes `request` and validates the body into `T`.
	pub async fn execute_json<T>(&self, request: &RequestDescriptor) -> Result<T>
	where
		T: DeserializeOwned,
	{
		Ok(self.execute(request).await?.json()?)
	}

	async fn run(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
		let url = self.base_url.join(request.path()).map_err(ConfigError::from)?;
		let category = request.category();
		let mut refreshed: Option<Credential> = None;
		let mut unauthorized = false;
		let mut throttled = 0;
		let mut network_failures = 0;

		if self.cancel.is_cancelled() {
			return Err(Error::SessionClosed);
		}

		loop {
			self.limiter.acquire(category, &self.cancel).await?;

			let credential = match refreshed.take() {
				Some(credential) => credential,
				None => self.tokens.valid_token().await?,
			};
			let sent = tokio::select! {
				_ = self.cancel.cancelled() => return Err(Error::SessionClosed),
				sent = self.send(request, &url, &credential) => sent,
			};
			let (status, headers, body) = match sent {
				Ok(parts) => parts,
				Err(err) => {
					network_failures += 1;

					let retryable = request.is_idempotent()
						|| self.retry.retry_non_idempotent
						|| err.is_connect();

					if !retryable || network_failures > self.retry.max_network_retries {
						return Err(NetworkError::transport(network_failures, err).into());
					}

					let delay = self.retry.backoff(network_failures - 1);

					tracing::warn!(
						method = %request.method(),
						path = request.path(),
						attempt = network_failures,
						delay_ms = delay.as_millis() as u64,
						error = %err,
						"Request failed at the transport layer; retrying."
					);
					obs::record_op_outcome(OpKind::Request, OpOutcome::Retry);

					tokio::select! {
						_ = self.cancel.cancelled() => return Err(Error::SessionClosed),
						_ = tokio::time::sleep(delay) => {},
					}

					continue;
				},
			};

			match status {
				status if status.is_success() => {
					self.limiter.after_response(category, &headers);

					return Ok(ApiResponse::new(status.as_u16(), headers, body));
				},
				StatusCode::UNAUTHORIZED if !unauthorized => {
					unauthorized = true;

					tracing::info!(
						path = request.path(),
						"Request was rejected with 401; refreshing token."
					);
					obs::record_op_outcome(OpKind::Request, OpOutcome::Retry);

					refreshed = Some(self.tokens.force_refresh().await?);
				},
				StatusCode::UNAUTHORIZED => return Err(AuthError::Unauthorized.into()),
				StatusCode::TOO_MANY_REQUESTS => {
					throttled += 1;

					let retry_after = http::parse_retry_after(&headers)
						.or_else(|| Duration::try_from(self.retry.default_retry_after).ok())
						.unwrap_or(Duration::SECOND);

					self.limiter.on_429(category, retry_after);

					if throttled > self.retry.max_rate_limit_retries {
						return Err(Error::RateLimitExceeded {
							category,
							attempts: throttled,
							retry_after: Some(retry_after),
						});
					}

					tracing::warn!(
						category = category.as_str(),
						attempt = throttled,
						retry_after_ms = retry_after.whole_milliseconds() as u64,
						"Request was throttled; waiting for the quota window."
					);
					obs::record_op_outcome(OpKind::Request, OpOutcome::Retry);
				},
				status => {
					self.limiter.after_response(category, &headers);

					return Err(ApiError::from_response(status.as_u16(), &body).into());
				},
			}
		}
	}

	async fn send(
		&self,
		request: &RequestDescriptor,
		url: &Url,
		credential: &Credential,
	) -> Result<(StatusCode, HeaderMap, Vec<u8>), ReqwestError> {
		let mut builder = self
			.http
			.request(request.method().clone(), url.clone())
			.header(ACCEPT, "application/json");

		if let Some(timeout) = self.timeout {
			builder = builder.timeout(timeout);
		}
		if !request.query().is_empty() {
			builder = builder.query(request.query());
		}
		if let Some(body) = request.body() {
			builder = builder.header(CONTENT_TYPE, "application/json").body(body.to_string());
		}

		let response = credential.attach(builder).send().await?;
		let status = response.status();
		let headers = response.headers().clone();
		let body = response.bytes().await?.to_vec();

		Ok((status, headers, body))
	}
}
impl Debug for RequestExecutor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestExecutor")
			.field("base_url", &self.base_url.as_str())
			.field("retry", &self.retry)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}
