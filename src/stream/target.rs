//! Identity of one physical streaming connection.

// self
use crate::_prelude::*;

/// Streaming endpoint plus its query parameters.
///
/// Subscriptions with equal targets share a connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamTarget {
	path: String,
	query: BTreeMap<String, String>,
}
impl StreamTarget {
	/// Targets `path`, relative to the API base URL.
	pub fn new(path: impl Into<String>) -> Self {
		Self { path: path.into(), query: BTreeMap::new() }
	}

	/// Adds a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.insert(key.into(), value.into());

		self
	}

	/// Endpoint path.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Query parameters in key order.
	pub fn query(&self) -> &BTreeMap<String, String> {
		&self.query
	}
}
impl Display for StreamTarget {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.path)?;

		for (i, (key, value)) in self.query.iter().enumerate() {
			write!(f, "{}{key}={value}", if i == 0 { '?' } else { '&' })?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashSet;
	// self
	use super::*;

	#[test]
	fn query_order_does_not_affect_identity() {
		let a = StreamTarget::new("/v3/marketdata/stream/barcharts/MSFT")
			.with_query("interval", "1")
			.with_query("unit", "Minute");
		let b = StreamTarget::new("/v3/marketdata/stream/barcharts/MSFT")
			.with_query("unit", "Minute")
			.with_query("interval", "1");

		assert_eq!(a, b);
		assert_eq!(HashSet::from([a.clone(), b]).len(), 1);
		assert_eq!(a.to_string(), "/v3/marketdata/stream/barcharts/MSFT?interval=1&unit=Minute");
	}
}
