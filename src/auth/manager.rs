//! Token lifecycle: cached credential, coalesced refresh, bounded retry.
//!
//! [`TokenManager::get_valid_token`] serves the cached credential while it is valid for at
//! least the grace window. Otherwise the caller joins the refresh guard: the first caller
//! performs the `grant_type=refresh_token` exchange and every caller that queued behind it
//! receives that exchange's outcome, so at most one exchange is ever in flight.
//! [`TokenManager::force_refresh`] follows the same path but skips the cache check.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{Credential, RefreshMetrics, TokenFuture, TokenSecret, TokenSource},
	config::ClientConfig,
	error::{AuthError, ConfigError},
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ExchangeFailure, RefreshFacade},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

#[derive(Debug, Default)]
struct ExchangeLedger {
	completed: u64,
	last: Option<Result<Credential, AuthError>>,
}

/// Owns the session credential and refreshes it on demand.
pub struct TokenManager<C = ReqwestHttpClient>
where
	C: ?Sized + TokenHttpClient,
{
	facade: RefreshFacade<C>,
	credential: RwLock<Option<Credential>>,
	refresh_token: RwLock<Option<TokenSecret>>,
	grace: Duration,
	safety_margin: Duration,
	max_attempts: u32,
	initial_backoff: StdDuration,
	max_backoff: StdDuration,
	refresh_guard: AsyncMutex<()>,
	ledger: Mutex<ExchangeLedger>,
	metrics: Arc<RefreshMetrics>,
	cancel: CancellationToken,
}
impl TokenManager<ReqwestHttpClient> {
	/// Creates a manager with its own reqwest transport; redirects are disabled for the token
	/// endpoint.
	pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.timeout(config.request_timeout)
			.build()?;

		Self::with_http_client(config, ReqwestHttpClient::with_client(client))
	}
}
impl<C> TokenManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a manager that reuses the caller-provided token transport.
	pub fn with_http_client(
		config: &ClientConfig,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			facade: RefreshFacade::new(config, http_client)?,
			credential: RwLock::new(None),
			refresh_token: RwLock::new(config.refresh_token.clone().map(TokenSecret::new)),
			grace: config.token_grace,
			safety_margin: config.token_safety_margin,
			max_attempts: config.refresh_max_attempts.max(1),
			initial_backoff: config.retry.initial_backoff,
			max_backoff: config.retry.max_backoff,
			refresh_guard: AsyncMutex::new(()),
			ledger: Mutex::default(),
			metrics: Default::default(),
			cancel: CancellationToken::new(),
		})
	}

	/// Seeds the cache with a previously issued credential.
	///
	/// The credential's refresh token, if any, replaces the configured one.
	pub fn with_credential(self, credential: Credential) -> Self {
		if let Some(secret) = credential.refresh_token() {
			*self.refresh_token.write() = Some(secret.clone());
		}

		*self.credential.write() = Some(credential);

		self
	}

	/// Ties pending refresh backoffs to `cancel`.
	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;

		self
	}

	/// Exchange counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Cached credential, regardless of validity.
	pub fn current(&self) -> Option<Credential> {
		self.credential.read().clone()
	}

	/// Refresh token that the next exchange will present, including server rotations.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.refresh_token.read().clone()
	}

	/// Returns a credential valid for at least the grace window, refreshing first if needed.
	pub async fn get_valid_token(&self) -> Result<Credential, AuthError> {
		if let Some(credential) = self.cached_valid(OffsetDateTime::now_utc()) {
			return Ok(credential);
		}

		self.observed(OpSpan::new(OpKind::Refresh, "get_valid_token"), self.refresh(false)).await
	}

	/// Exchanges the refresh token even if the cached credential still looks valid.
	pub async fn force_refresh(&self) -> Result<Credential, AuthError> {
		self.observed(OpSpan::new(OpKind::Refresh, "force_refresh"), self.refresh(true)).await
	}

	async fn observed<F>(&self, span: OpSpan, fut: F) -> Result<Credential, AuthError>
	where
		F: Future<Output = Result<Credential, AuthError>>,
	{
		obs::record_op_outcome(OpKind::Refresh, OpOutcome::Attempt);

		let result = span.instrument(fut).await;

		match &result {
			Ok(_) => obs::record_op_outcome(OpKind::Refresh, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(OpKind::Refresh, OpOutcome::Failure),
		}

		result
	}

	fn cached_valid(&self, now: OffsetDateTime) -> Option<Credential> {
		self.credential
			.read()
			.as_ref()
			.filter(|credential| credential.is_valid_for(self.grace, now))
			.cloned()
	}

	async fn refresh(&self, force: bool) -> Result<Credential, AuthError> {
		let seen = self.ledger.lock().completed;
		let _singleflight = self.refresh_guard.lock().await;

		{
			let ledger = self.ledger.lock();

			if ledger.completed != seen
				&& let Some(outcome) = &ledger.last
			{
				self.metrics.record_coalesced();

				return outcome.clone();
			}
		}

		if !force && let Some(credential) = self.cached_valid(OffsetDateTime::now_utc()) {
			return Ok(credential);
		}

		let result = self.exchange_with_retry().await;
		let mut ledger = self.ledger.lock();

		ledger.completed += 1;
		ledger.last = Some(result.clone());

		result
	}

	async fn exchange_with_retry(&self) -> Result<Credential, AuthError> {
		let Some(refresh_token) = self.refresh_token.read().clone() else {
			self.metrics.record_failure();

			return Err(AuthError::MissingRefreshToken);
		};
		let mut attempt = 0;

		loop {
			attempt += 1;
			self.metrics.record_attempt();

			let outcome = self.facade.refresh(&refresh_token, self.safety_margin).await;
			let (message, status, retry_after) = match outcome {
				Ok(credential) => {
					if let Some(rotated) = credential.refresh_token() {
						*self.refresh_token.write() = Some(rotated.clone());
					}

					*self.credential.write() = Some(credential.clone());
					self.metrics.record_success();
					tracing::debug!(
						attempt,
						expires_at = %credential.expires_at(),
						"Access token refreshed."
					);

					return Ok(credential);
				},
				Err(ExchangeFailure::Fatal(err)) => {
					self.metrics.record_failure();
					tracing::warn!(attempt, error = %err, "Token refresh was rejected.");

					return Err(err);
				},
				Err(ExchangeFailure::Transient { message, status, retry_after }) => {
					if attempt >= self.max_attempts {
						self.metrics.record_failure();
						tracing::warn!(
							attempt,
							?status,
							%message,
							"Token refresh attempts exhausted."
						);

						return Err(AuthError::RefreshFailed { attempts: attempt, message, status });
					}

					(message, status, retry_after)
				},
			};
			let delay = retry_after
				.map(|hint| hint.unsigned_abs())
				.unwrap_or_else(|| self.backoff(attempt - 1))
				.min(self.max_backoff);

			tracing::warn!(
				attempt,
				?status,
				%message,
				delay_ms = delay.as_millis() as u64,
				"Token refresh failed; retrying."
			);

			tokio::select! {
				_ = self.cancel.cancelled() => {
					self.metrics.record_failure();

					return Err(AuthError::Cancelled);
				},
				_ = tokio::time::sleep(delay) => {},
			}
		}
	}

	fn backoff(&self, retry: u32) -> StdDuration {
		let factor = 2_u32.saturating_pow(retry.min(16));

		self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
	}
}
impl<C> TokenSource for TokenManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn valid_token(&self) -> TokenFuture<'_> {
		Box::pin(self.get_valid_token())
	}

	fn force_refresh(&self) -> TokenFuture<'_> {
		Box::pin(TokenManager::force_refresh(self))
	}
}
impl<C> Debug for TokenManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("credential", &*self.credential.read())
			.field("refresh_token_set", &self.refresh_token.read().is_some())
			.field("grace", &self.grace)
			.field("max_attempts", &self.max_attempts)
			.finish_non_exhaustive()
	}
}
