//! Exponential backoff with jitter between reconnect attempts.

// std
use std::time::Duration as StdDuration;
// crates.io
use rand::Rng;
// self
use crate::config::ReconnectConfig;

/// Tracks reconnect attempts for one connection.
#[derive(Debug)]
pub struct ReconnectPolicy {
	config: ReconnectConfig,
	current_delay: StdDuration,
	attempts: u32,
}
impl ReconnectPolicy {
	/// Creates a policy at its first attempt.
	pub fn new(config: ReconnectConfig) -> Self {
		let current_delay = config.initial_delay;

		Self { config, current_delay, attempts: 0 }
	}

	/// Returns the delay before the next attempt, or `None` once `max_attempts` attempts were
	/// handed out. A `max_attempts` of zero never exhausts.
	pub fn next_delay(&mut self) -> Option<StdDuration> {
		if self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts {
			return None;
		}

		self.attempts += 1;

		let delay = self.with_jitter(self.current_delay);
		let scaled =
			(self.current_delay.as_nanos() as f64 * self.config.multiplier.max(1.0)).round();

		self.current_delay = if scaled.is_finite() && scaled < u64::MAX as f64 {
			StdDuration::from_nanos(scaled as u64).min(self.config.max_delay)
		} else {
			self.config.max_delay
		};

		Some(delay)
	}

	/// Starts over after a healthy connection.
	pub fn reset(&mut self) {
		self.current_delay = self.config.initial_delay;
		self.attempts = 0;
	}

	/// Attempts handed out since the last reset.
	pub fn attempts(&self) -> u32 {
		self.attempts
	}

	fn with_jitter(&self, delay: StdDuration) -> StdDuration {
		let jitter = self.config.jitter_factor.clamp(0.0, 1.0);

		if jitter == 0.0 || delay.is_zero() {
			return delay;
		}

		let factor = rand::rng().random_range(1.0 - jitter..=1.0 + jitter);

		delay.mul_f64(factor).min(self.config.max_delay)
	}
}
