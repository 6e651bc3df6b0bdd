//! Session object tying the token manager, rate limiter, executor and stream manager
//! together.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{TokenManager, TokenSecret, TokenSource},
	config::{ClientConfig, Environment},
	error::ConfigError,
	executor::{ApiResponse, RequestDescriptor, RequestExecutor},
	http::ReqwestHttpClient,
	rate_limit::{Category, RateLimitState, RateLimiter},
	services::{Brokerage, MarketData, OrderExecution},
	stream::{ReqwestStreamConnector, StreamConnector, StreamManager, StreamTarget, Subscription},
};

/// One authenticated TradeStation session.
///
/// Owns exactly one token manager and one rate limiter; every request and stream opened
/// through the session shares them. [`TradeStationClient::close`] tears everything down.
pub struct TradeStationClient {
	config: ClientConfig,
	token_manager: Option<Arc<TokenManager>>,
	executor: RequestExecutor,
	streams: StreamManager,
	cancel: CancellationToken,
	closed: AtomicBool,
}
impl TradeStationClient {
	/// Builds a session with its own HTTP transports.
	pub fn new(config: ClientConfig) -> Result<Self> {
		let http = ReqwestClient::builder().build().map_err(ConfigError::from)?;
		let token_http = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.timeout(config.request_timeout)
			.build()
			.map_err(ConfigError::from)?;

		Self::with_http_clients(config, http, ReqwestHttpClient::with_client(token_http))
	}

	/// Builds a session from the `CLIENT_ID`, `CLIENT_SECRET`, `REFRESH_TOKEN` and `ENVIRONMENT`
	/// variables.
	pub fn from_env() -> Result<Self> {
		Self::new(ClientConfig::from_env()?)
	}

	/// Builds a session over caller-provided transports.
	///
	/// `http` serves both REST calls and streams, so it must not carry a total timeout;
	/// [`ClientConfig::request_timeout`] is applied per REST request instead.
	pub fn with_http_clients(
		config: ClientConfig,
		http: ReqwestClient,
		token_http: ReqwestHttpClient,
	) -> Result<Self> {
		let cancel = CancellationToken::new();
		let manager = Arc::new(
			TokenManager::with_http_client(&config, token_http)?
				.with_cancellation(cancel.child_token()),
		);
		let connector = Arc::new(ReqwestStreamConnector::new(http.clone(), config.api_base_url()?));

		Self::assemble(config, http, manager.clone(), Some(manager), connector, cancel)
	}

	/// Builds a session over an arbitrary token source and stream connector.
	pub fn with_parts(
		config: ClientConfig,
		http: ReqwestClient,
		tokens: Arc<dyn TokenSource>,
		connector: Arc<dyn StreamConnector>,
	) -> Result<Self> {
		Self::assemble(config, http, tokens, None, connector, CancellationToken::new())
	}

	fn assemble(
		config: ClientConfig,
		http: ReqwestClient,
		tokens: Arc<dyn TokenSource>,
		token_manager: Option<Arc<TokenManager>>,
		connector: Arc<dyn StreamConnector>,
		cancel: CancellationToken,
	) -> Result<Self> {
		config.validate()?;

		let limiter = Arc::new(RateLimiter::new(config.default_rate_limit));
		let executor = RequestExecutor::new(
			http,
			config.api_base_url()?,
			Arc::clone(&tokens),
			limiter,
			config.retry.clone(),
		)
		.with_request_timeout(config.request_timeout)
		.with_cancellation(cancel.child_token());
		let streams = StreamManager::new(connector, tokens, config.stream.clone())
			.with_cancellation(cancel.child_token());

		tracing::debug!(environment = %config.environment, "Client session created.");

		Ok(Self {
			config,
			token_manager,
			executor,
			streams,
			cancel,
			closed: AtomicBool::new(false),
		})
	}

	/// Session configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Target environment.
	pub fn environment(&self) -> Environment {
		self.config.environment
	}

	/// Token manager backing the session, unless it was built with [`Self::with_parts`].
	pub fn token_manager(&self) -> Option<&TokenManager> {
		self.token_manager.as_deref()
	}

	/// Latest refresh token, including server rotations, for persistence by the caller.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.token_manager.as_ref().and_then(|manager| manager.refresh_token())
	}

	/// Last known quota of `category`.
	pub fn rate_limit(&self, category: Category) -> Option<RateLimitState> {
		self.executor.limiter().state(category)
	}

	/// Executes one REST call.
	pub async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
		if self.is_closed() {
			return Err(Error::SessionClosed);
		}

		self.executor.execute(request).await
	}

	/// Executes one REST call and validates the body into `T`.
	pub async fn execute_json<T>(&self, request: &RequestDescriptor) -> Result<T>
	where
		T: DeserializeOwned,
	{
		if self.is_closed() {
			return Err(Error::SessionClosed);
		}

		self.executor.execute_json(request).await
	}

	/// Subscribes to a streaming endpoint.
	///
	/// Must be called within a Tokio runtime.
	pub fn subscribe(&self, target: StreamTarget) -> Result<Subscription> {
		if self.is_closed() {
			return Err(Error::SessionClosed);
		}

		self.streams.subscribe(target)
	}

	/// Physical streaming connections currently held.
	pub fn active_streams(&self) -> usize {
		self.streams.active_connections()
	}

	/// Quotes, bars, symbols and options.
	pub fn market_data(&self) -> MarketData<'_> {
		MarketData::new(self)
	}

	/// Accounts, balances, positions and orders.
	pub fn brokerage(&self) -> Brokerage<'_> {
		Brokerage::new(self)
	}

	/// Order placement and management.
	pub fn order_execution(&self) -> OrderExecution<'_> {
		OrderExecution::new(self)
	}

	/// Returns `true` once [`Self::close`] ran.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Cancels pending waits, closes every stream and waits for connection tasks to exit.
	///
	/// Calling it again does nothing.
	pub async fn close(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}

		self.cancel.cancel();
		self.streams.close().await;

		tracing::info!(environment = %self.config.environment, "Client session closed.");
	}
}
impl Drop for TradeStationClient {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}
impl Debug for TradeStationClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TradeStationClient")
			.field("config", &self.config)
			.field("executor", &self.executor)
			.field("streams", &self.streams)
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}
