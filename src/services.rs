//! Per-endpoint services over a [`TradeStationClient`](crate::client::TradeStationClient).
//!
//! Each service borrows the session, validates arguments locally and funnels the call through
//! the session's `execute_json` or `subscribe`, so every endpoint shares one token manager,
//! one rate limiter and the stream manager's reconnect handling.

pub mod brokerage;
pub mod market_data;
pub mod order_execution;

pub use brokerage::Brokerage;
pub use market_data::MarketData;
pub use order_execution::OrderExecution;

// self
use crate::_prelude::*;

/// Joins `items` into the comma-separated path segment the API expects.
pub(crate) fn join_list<S>(kind: &str, items: &[S], max: usize) -> Result<String>
where
	S: AsRef<str>,
{
	if items.is_empty() {
		return Err(Error::InvalidRequest { reason: format!("at least one {kind} is required") });
	}
	if items.len() > max {
		return Err(Error::InvalidRequest {
			reason: format!("at most {max} {kind}s are allowed per request, got {}", items.len()),
		});
	}
	if items.iter().any(|item| item.as_ref().trim().is_empty()) {
		return Err(Error::InvalidRequest { reason: format!("{kind} must not be blank") });
	}

	Ok(items.iter().map(|item| item.as_ref().trim()).collect::<Vec<_>>().join(","))
}

/// Rejects a blank single identifier.
pub(crate) fn require(kind: &str, value: &str) -> Result<String> {
	let value = value.trim();

	if value.is_empty() {
		return Err(Error::InvalidRequest { reason: format!("{kind} must not be blank") });
	}

	Ok(value.to_owned())
}
