//! Per-category quota tracking fed by `X-RateLimit-*` response headers.
//!
//! The limiter keeps one [`RateLimitState`] per [`Category`]. [`RateLimiter::before_request`]
//! consumes a slot or answers with a [`RetryDirective`], [`RateLimiter::after_response`]
//! overwrites the state with what the server reported, and [`RateLimiter::on_429`] closes the
//! bucket until the Retry-After instant. Every mutation happens inside one short critical
//! section so concurrent callers never over-consume a bucket.

mod category;

pub use category::Category;

// crates.io
use reqwest::header::HeaderMap;
use time::PrimitiveDateTime;
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, config::DEFAULT_RATE_LIMIT, http::MAX_RETRY_AFTER};

/// Header carrying the bucket size.
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Header carrying the slots left in the current window.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Header carrying the window reset instant (epoch seconds).
pub const RESET_HEADER: &str = "x-ratelimit-reset";

// Reset values below this are treated as seconds from now rather than epoch seconds.
const RELATIVE_RESET_CEILING: i64 = 1_000_000_000;

/// Quota snapshot for one category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitState {
	/// Bucket size reported by the server.
	pub limit: u32,
	/// Slots left before the reset instant.
	pub remaining: u32,
	/// When the bucket refills, if known.
	pub reset_at: Option<OffsetDateTime>,
}
impl RateLimitState {
	/// Full bucket without a known reset instant.
	pub const fn full(limit: u32) -> Self {
		Self { limit, remaining: limit, reset_at: None }
	}
}

/// Result of consulting the limiter before a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Allow,
	/// The request should be delayed.
	Delay(RetryDirective),
}

/// Advises callers when to retry after a [`RateLimitDecision::Delay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when it is safe to retry.
	pub earliest_retry_at: OffsetDateTime,
	/// Time left until `earliest_retry_at`.
	pub recommended_backoff: Duration,
	/// Optional descriptive string.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: None }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}
}

/// Session-wide quota governor.
#[derive(Debug)]
pub struct RateLimiter {
	default_limit: u32,
	states: Mutex<HashMap<Category, RateLimitState>>,
}
impl RateLimiter {
	/// Creates a limiter that assumes `default_limit` when a response omits the limit header.
	pub fn new(default_limit: u32) -> Self {
		Self { default_limit, states: Mutex::default() }
	}

	/// Consumes a slot for `category` or reports how long to wait.
	pub fn before_request(&self, category: Category) -> RateLimitDecision {
		self.before_request_at(category, OffsetDateTime::now_utc())
	}

	/// [`RateLimiter::before_request`] evaluated at `now`.
	pub fn before_request_at(&self, category: Category, now: OffsetDateTime) -> RateLimitDecision {
		let mut states = self.states.lock();
		let Some(state) = states.get_mut(&category) else {
			return RateLimitDecision::Allow;
		};

		if state.remaining > 0 {
			state.remaining -= 1;

			return RateLimitDecision::Allow;
		}

		match state.reset_at {
			Some(reset_at) if reset_at > now => RateLimitDecision::Delay(
				RetryDirective::new(reset_at, reset_at - now)
					.with_reason(format!("The {category} quota is exhausted until {reset_at}.")),
			),
			_ => {
				// Window passed without fresh headers; refill optimistically.
				state.remaining = state.limit.saturating_sub(1);
				state.reset_at = None;

				RateLimitDecision::Allow
			},
		}
	}

	/// Overwrites the state for `category` with the quota headers of a response.
	pub fn after_response(&self, category: Category, headers: &HeaderMap) {
		self.after_response_at(category, headers, OffsetDateTime::now_utc());
	}

	/// [`RateLimiter::after_response`] evaluated at `now`.
	pub fn after_response_at(&self, category: Category, headers: &HeaderMap, now: OffsetDateTime) {
		let limit = header_i64(headers, LIMIT_HEADER);
		let remaining = header_i64(headers, REMAINING_HEADER);
		let reset = header_i64(headers, RESET_HEADER);

		if limit.is_none() && remaining.is_none() && reset.is_none() {
			return;
		}

		let mut states = self.states.lock();
		let previous = states.get(&category).copied();
		let limit = limit
			.map(clamp_u32)
			.or_else(|| previous.map(|state| state.limit))
			.unwrap_or(self.default_limit);
		let remaining = remaining
			.map(clamp_u32)
			.or_else(|| previous.map(|state| state.remaining))
			.unwrap_or(limit);
		let reset_at = reset.and_then(|value| {
			if value < RELATIVE_RESET_CEILING {
				now.checked_add(Duration::seconds(value.max(0)))
			} else {
				OffsetDateTime::from_unix_timestamp(value).ok()
			}
		});

		states.insert(category, RateLimitState { limit, remaining, reset_at });
	}

	/// Closes the bucket for `category` until `retry_after` has elapsed.
	pub fn on_429(&self, category: Category, retry_after: Duration) {
		self.on_429_at(category, retry_after, OffsetDateTime::now_utc());
	}

	/// [`RateLimiter::on_429`] evaluated at `now`.
	pub fn on_429_at(&self, category: Category, retry_after: Duration, now: OffsetDateTime) {
		let retry_after = retry_after.clamp(Duration::ZERO, MAX_RETRY_AFTER);
		let reset_at = now.checked_add(retry_after).unwrap_or(PrimitiveDateTime::MAX.assume_utc());
		let mut states = self.states.lock();
		let state =
			states.entry(category).or_insert_with(|| RateLimitState::full(self.default_limit));

		state.remaining = 0;
		state.reset_at = Some(reset_at);
	}

	/// Returns the tracked state for `category`, if any response has been observed.
	pub fn state(&self, category: Category) -> Option<RateLimitState> {
		self.states.lock().get(&category).copied()
	}

	/// Waits until a slot is available for `category`, consuming it.
	///
	/// Each wait lasts exactly until the bucket's reset instant. Fails with
	/// [`Error::SessionClosed`] once `cancel` fires.
	pub async fn acquire(&self, category: Category, cancel: &CancellationToken) -> Result<()> {
		loop {
			if cancel.is_cancelled() {
				return Err(Error::SessionClosed);
			}

			let directive = match self.before_request(category) {
				RateLimitDecision::Allow => return Ok(()),
				RateLimitDecision::Delay(directive) => directive,
			};

			tracing::debug!(
				category = category.as_str(),
				wait_ms = directive.recommended_backoff.whole_milliseconds() as u64,
				"Rate limit exhausted; waiting for the window to reset."
			);

			tokio::select! {
				_ = cancel.cancelled() => return Err(Error::SessionClosed),
				_ = tokio::time::sleep(directive.recommended_backoff.unsigned_abs()) => {},
			}
		}
	}
}
impl Default for RateLimiter {
	fn default() -> Self {
		Self::new(DEFAULT_RATE_LIMIT)
	}
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
	headers.get(name)?.to_str().ok()?.trim().parse::<f64>().ok().map(|value| value as i64)
}

fn clamp_u32(value: i64) -> u32 {
	u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	use time::macros::datetime;
	// self
	use super::*;

	const NOW: OffsetDateTime = datetime!(2025-03-01 14:30:00 UTC);

	fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
		let mut map = HeaderMap::new();

		for (name, value) in pairs {
			map.insert(*name, HeaderValue::from_str(value).expect("Header value should be valid."));
		}

		map
	}

	#[test]
	fn untracked_category_is_allowed_without_state() {
		let limiter = RateLimiter::default();

		assert_eq!(limiter.before_request_at(Category::MarketData, NOW), RateLimitDecision::Allow);
		assert!(limiter.state(Category::MarketData).is_none());
	}

	#[test]
	fn headers_overwrite_state_and_requests_consume_slots() {
		let limiter = RateLimiter::default();
		let reset = (NOW + Duration::seconds(60)).unix_timestamp().to_string();

		limiter.after_response_at(
			Category::Brokerage,
			&headers(&[(LIMIT_HEADER, "250"), (REMAINING_HEADER, "2"), (RESET_HEADER, &reset)]),
			NOW,
		);

		assert_eq!(limiter.before_request_at(Category::Brokerage, NOW), RateLimitDecision::Allow);
		assert_eq!(limiter.before_request_at(Category::Brokerage, NOW), RateLimitDecision::Allow);

		let state = limiter.state(Category::Brokerage).expect("State should be tracked.");

		assert_eq!(state.limit, 250);
		assert_eq!(state.remaining, 0);
		assert_eq!(state.reset_at, Some(NOW + Duration::seconds(60)));
	}

	#[test]
	fn exhausted_bucket_delays_until_reset_then_refills() {
		let limiter = RateLimiter::default();
		let reset = (NOW + Duration::seconds(42)).unix_timestamp().to_string();

		limiter.after_response_at(
			Category::MarketData,
			&headers(&[(LIMIT_HEADER, "100"), (REMAINING_HEADER, "0"), (RESET_HEADER, &reset)]),
			NOW,
		);

		match limiter.before_request_at(Category::MarketData, NOW) {
			RateLimitDecision::Delay(directive) => {
				assert_eq!(directive.recommended_backoff, Duration::seconds(42));
				assert_eq!(directive.earliest_retry_at, NOW + Duration::seconds(42));
			},
			other => panic!("Expected a delay, got {other:?}."),
		}

		let later = NOW + Duration::seconds(43);

		assert_eq!(
			limiter.before_request_at(Category::MarketData, later),
			RateLimitDecision::Allow
		);
		assert_eq!(
			limiter.state(Category::MarketData),
			Some(RateLimitState { limit: 100, remaining: 99, reset_at: None })
		);
	}

	#[test]
	fn oversized_retry_after_is_clamped() {
		let limiter = RateLimiter::default();

		limiter.on_429_at(Category::MarketData, Duration::seconds(i64::MAX), NOW);

		assert_eq!(
			limiter.state(Category::MarketData).and_then(|state| state.reset_at),
			Some(NOW + MAX_RETRY_AFTER)
		);

		let edge = PrimitiveDateTime::MAX.assume_utc() - Duration::HOUR;

		limiter.on_429_at(Category::Brokerage, MAX_RETRY_AFTER, edge);

		assert_eq!(
			limiter.state(Category::Brokerage).and_then(|state| state.reset_at),
			Some(PrimitiveDateTime::MAX.assume_utc())
		);
	}

	#[test]
	fn too_many_requests_closes_bucket_for_retry_after() {
		let limiter = RateLimiter::default();

		limiter.on_429_at(Category::OrderExecution, Duration::seconds(10), NOW);

		let RateLimitDecision::Delay(directive) =
			limiter.before_request_at(Category::OrderExecution, NOW + Duration::seconds(1))
		else {
			panic!("A 429 must delay the next request.");
		};

		assert_eq!(directive.recommended_backoff, Duration::seconds(9));
		assert_eq!(
			limiter.before_request_at(Category::OrderExecution, NOW + Duration::seconds(10)),
			RateLimitDecision::Allow
		);
		assert_eq!(
			limiter.state(Category::OrderExecution).map(|state| state.limit),
			Some(DEFAULT_RATE_LIMIT)
		);
	}

	#[test]
	fn responses_without_quota_headers_leave_state_untouched() {
		let limiter = RateLimiter::default();

		limiter.after_response_at(Category::MarketData, &headers(&[(REMAINING_HEADER, "5")]), NOW);
		limiter.after_response_at(Category::MarketData, &HeaderMap::new(), NOW);

		assert_eq!(
			limiter.state(Category::MarketData),
			Some(RateLimitState { limit: DEFAULT_RATE_LIMIT, remaining: 5, reset_at: None })
		);
	}

	#[test]
	fn small_reset_values_are_relative() {
		let limiter = RateLimiter::default();

		limiter.after_response_at(
			Category::MarketData,
			&headers(&[(REMAINING_HEADER, "0"), (RESET_HEADER, "30")]),
			NOW,
		);

		assert_eq!(
			limiter.state(Category::MarketData).and_then(|state| state.reset_at),
			Some(NOW + Duration::seconds(30))
		);
	}

	#[test]
	fn categories_are_independent() {
		let limiter = RateLimiter::default();

		limiter.on_429_at(Category::MarketData, Duration::minutes(1), NOW);

		assert!(matches!(
			limiter.before_request_at(Category::MarketData, NOW),
			RateLimitDecision::Delay(_)
		));
		assert_eq!(limiter.before_request_at(Category::Brokerage, NOW), RateLimitDecision::Allow);
	}

	#[tokio::test]
	async fn acquire_waits_for_short_windows() {
		let limiter = RateLimiter::default();
		let cancel = CancellationToken::new();
		let started = std::time::Instant::now();

		limiter.on_429(Category::MarketData, Duration::milliseconds(150));
		limiter.acquire(Category::MarketData, &cancel).await.expect("Acquire should succeed.");

		assert!(started.elapsed() >= std::time::Duration::from_millis(140));
	}

	#[tokio::test]
	async fn acquire_stops_when_cancelled() {
		let limiter = Arc::new(RateLimiter::default());
		let cancel = CancellationToken::new();

		limiter.on_429(Category::MarketData, Duration::hours(1));

		let waiter = {
			let limiter = limiter.clone();
			let cancel = cancel.clone();

			tokio::spawn(async move { limiter.acquire(Category::MarketData, &cancel).await })
		};

		cancel.cancel();

		let result = waiter.await.expect("Waiter task should not panic.");

		assert!(matches!(result, Err(Error::SessionClosed)));
	}
}
