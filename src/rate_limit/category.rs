// self
use crate::_prelude::*;

/// Endpoint family sharing one server-side quota bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
	/// `/v3/marketdata/...`
	MarketData,
	/// `/v3/brokerage/...`
	Brokerage,
	/// `/v3/orderexecution/...`
	OrderExecution,
	/// Any other path.
	Other,
}
impl Category {
	/// Derives the bucket from a request path such as `/v3/marketdata/quotes/MSFT`.
	pub fn from_path(path: &str) -> Self {
		let mut segments = path.trim_start_matches('/').split('/');
		let family = match (segments.next(), segments.next()) {
			(Some(version), Some(family)) if version.starts_with('v') => family,
			(Some(family), _) => family,
			_ => "",
		};

		match family.to_ascii_lowercase().as_str() {
			"marketdata" => Self::MarketData,
			"brokerage" => Self::Brokerage,
			"orderexecution" => Self::OrderExecution,
			_ => Self::Other,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::MarketData => "market_data",
			Self::Brokerage => "brokerage",
			Self::OrderExecution => "order_execution",
			Self::Other => "other",
		}
	}
}
impl Display for Category {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
