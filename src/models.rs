//! Typed TradeStation payloads.
//!
//! Field names follow the API's PascalCase wire names. Prices and quantities the API sends
//! as strings stay strings so no precision is lost in transit.

#[allow(missing_docs)]
pub mod brokerage;
#[allow(missing_docs)]
pub mod market_data;
#[allow(missing_docs)]
pub mod order_execution;

// self
use crate::_prelude::*;

/// Per-item failure reported next to partial results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemError {
	/// Symbol the failure belongs to, for market data requests.
	#[serde(default)]
	pub symbol: Option<String>,
	/// Account the failure belongs to, for brokerage requests.
	#[serde(default, rename = "AccountID")]
	pub account_id: Option<String>,
	/// Order the failure belongs to, for order lookups.
	#[serde(default, rename = "OrderID")]
	pub order_id: Option<String>,
	/// Error code.
	pub error: String,
	/// Description.
	#[serde(default)]
	pub message: Option<String>,
}
