//! Session configuration with documented defaults and environment loading.
//!
//! [`ClientConfig`] is a plain struct; every knob has a default and a consuming `with_*`
//! builder. [`ClientConfig::from_env`] reads `CLIENT_ID`, `CLIENT_SECRET`, `REFRESH_TOKEN`, and
//! `ENVIRONMENT` so demos and services can boot without code changes.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Default token endpoint for the `refresh_token` grant.
pub const DEFAULT_TOKEN_URL: &str = "https://signin.tradestation.com/oauth/token";
/// Rate limit assumed when a response omits `X-RateLimit-Limit`.
pub const DEFAULT_RATE_LIMIT: u32 = 120;

/// Trading environment selecting the API host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
	/// Paper-trading host.
	#[default]
	Simulation,
	/// Production host.
	Live,
}
impl Environment {
	/// Returns the API base URL for the environment.
	pub const fn base_url(self) -> &'static str {
		match self {
			Self::Simulation => "https://sim.api.tradestation.com",
			Self::Live => "https://api.tradestation.com",
		}
	}

	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Simulation => "Simulation",
			Self::Live => "Live",
		}
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Environment {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"simulation" | "sim" => Ok(Self::Simulation),
			"live" => Ok(Self::Live),
			"" => Err(ConfigError::MissingEnvironment),
			_ => Err(ConfigError::UnknownEnvironment { value: s.to_owned() }),
		}
	}
}

/// Retry budget applied by the request executor.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
	/// Retries after a network failure before surfacing `NetworkError`.
	pub max_network_retries: u32,
	/// Retries after HTTP 429 before surfacing `RateLimitExceeded`.
	pub max_rate_limit_retries: u32,
	/// First backoff delay.
	pub initial_backoff: StdDuration,
	/// Backoff ceiling.
	pub max_backoff: StdDuration,
	/// Retry-After used when a 429 carries no hint.
	pub default_retry_after: StdDuration,
	/// Allow retrying POST/PATCH requests after failures past the connect phase.
	pub retry_non_idempotent: bool,
}
impl RetryConfig {
	/// Exponential delay for the zero-based retry `attempt`, capped at `max_backoff`.
	pub fn backoff(&self, attempt: u32) -> StdDuration {
		let factor = 2_u32.saturating_pow(attempt.min(16));

		self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
	}
}
impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_network_retries: 3,
			max_rate_limit_retries: 3,
			initial_backoff: StdDuration::from_millis(250),
			max_backoff: StdDuration::from_secs(5),
			default_retry_after: StdDuration::from_secs(1),
			retry_non_idempotent: false,
		}
	}
}

/// Reconnect schedule for streaming connections.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconnectConfig {
	/// Delay before the first reconnect attempt.
	pub initial_delay: StdDuration,
	/// Delay ceiling.
	pub max_delay: StdDuration,
	/// Growth factor per attempt.
	pub multiplier: f64,
	/// Jitter as a fraction of the delay (0.0..=1.0).
	pub jitter_factor: f64,
	/// Attempts allowed before the subscription is closed.
	pub max_attempts: u32,
}
impl Default for ReconnectConfig {
	fn default() -> Self {
		Self {
			initial_delay: StdDuration::from_secs(1),
			max_delay: StdDuration::from_secs(30),
			multiplier: 2.0,
			jitter_factor: 0.1,
			max_attempts: 5,
		}
	}
}

/// Streaming behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamConfig {
	/// Silence tolerated before a connection is considered stale.
	pub heartbeat_timeout: StdDuration,
	/// Reconnect schedule.
	pub reconnect: ReconnectConfig,
	/// Events buffered per consumer before the oldest are dropped.
	pub channel_capacity: usize,
	/// Physical connections allowed at once.
	pub max_concurrent_streams: usize,
}
impl StreamConfig {
	/// Server heartbeat cadence.
	pub const HEARTBEAT_INTERVAL: StdDuration = StdDuration::from_secs(5);
}
impl Default for StreamConfig {
	fn default() -> Self {
		Self {
			heartbeat_timeout: Self::HEARTBEAT_INTERVAL * 2,
			reconnect: ReconnectConfig::default(),
			channel_capacity: 1024,
			max_concurrent_streams: 10,
		}
	}
}

/// Complete session configuration.
#[derive(Clone)]
pub struct ClientConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, sent in the request body when present.
	pub client_secret: Option<String>,
	/// Long-lived refresh token minted out of band.
	pub refresh_token: Option<String>,
	/// Trading environment.
	pub environment: Environment,
	/// Overrides the environment's API host.
	pub base_url: Option<Url>,
	/// Overrides the token endpoint ([`DEFAULT_TOKEN_URL`] when unset).
	pub token_url: Option<Url>,
	/// Per-request timeout for non-streaming calls.
	pub request_timeout: StdDuration,
	/// Minimum remaining validity a handed-out credential must have.
	pub token_grace: Duration,
	/// Subtracted from the server lifetime when computing `expires_at`.
	pub token_safety_margin: Duration,
	/// Exchanges attempted per refresh before failing.
	pub refresh_max_attempts: u32,
	/// Executor retry budget.
	pub retry: RetryConfig,
	/// Streaming behavior.
	pub stream: StreamConfig,
	/// Limit assumed when responses omit `X-RateLimit-Limit`.
	pub default_rate_limit: u32,
}
impl ClientConfig {
	/// Creates a configuration with defaults for everything except the client and environment.
	pub fn new(client_id: impl Into<String>, environment: Environment) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			refresh_token: None,
			environment,
			base_url: None,
			token_url: None,
			request_timeout: StdDuration::from_secs(30),
			token_grace: Duration::seconds(30),
			token_safety_margin: Duration::seconds(30),
			refresh_max_attempts: 3,
			retry: RetryConfig::default(),
			stream: StreamConfig::default(),
			default_rate_limit: DEFAULT_RATE_LIMIT,
		}
	}

	/// Loads `CLIENT_ID`, `CLIENT_SECRET`, `REFRESH_TOKEN`, and `ENVIRONMENT` from the process
	/// environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Same as [`ClientConfig::from_env`] with a custom variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let client_id = non_empty("CLIENT_ID").ok_or(ConfigError::MissingClientId)?;
		let environment =
			non_empty("ENVIRONMENT").ok_or(ConfigError::MissingEnvironment)?.parse()?;
		let mut config = Self::new(client_id, environment);

		config.client_secret = non_empty("CLIENT_SECRET");
		config.refresh_token = non_empty("REFRESH_TOKEN");

		Ok(config)
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Overrides the API host.
	pub fn with_base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Overrides the token endpoint.
	pub fn with_token_url(mut self, url: Url) -> Self {
		self.token_url = Some(url);

		self
	}

	/// Overrides the request timeout.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the token grace window (negative values clamp to zero).
	pub fn with_token_grace(mut self, grace: Duration) -> Self {
		self.token_grace = if grace.is_negative() { Duration::ZERO } else { grace };

		self
	}

	/// Overrides the refresh attempt budget (at least one attempt is always made).
	pub fn with_refresh_max_attempts(mut self, attempts: u32) -> Self {
		self.refresh_max_attempts = attempts.max(1);

		self
	}

	/// Replaces the executor retry budget.
	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;

		self
	}

	/// Replaces the streaming configuration.
	pub fn with_stream(mut self, stream: StreamConfig) -> Self {
		self.stream = stream;

		self
	}

	/// Resolves the effective API host.
	pub fn api_base_url(&self) -> Result<Url, ConfigError> {
		match &self.base_url {
			Some(url) => Ok(url.clone()),
			None => Ok(Url::parse(self.environment.base_url())?),
		}
	}

	/// Resolves the effective token endpoint.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		match &self.token_url {
			Some(url) => Ok(url.clone()),
			None => Ok(Url::parse(DEFAULT_TOKEN_URL)?),
		}
	}

	pub(crate) fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}

		self.api_base_url()?;
		self.token_endpoint().map(|_| ())
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("environment", &self.environment)
			.field("base_url", &self.base_url)
			.field("token_url", &self.token_url)
			.finish_non_exhaustive()
	}
}
