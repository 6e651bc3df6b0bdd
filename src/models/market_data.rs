//! Quotes, bars, symbols and options.

// self
use crate::{_prelude::*, models::ItemError};

/// Level 1 quote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Quote {
	pub symbol: String,
	pub open: Option<String>,
	pub high: Option<String>,
	pub low: Option<String>,
	pub previous_close: Option<String>,
	pub last: Option<String>,
	pub ask: Option<String>,
	pub ask_size: Option<String>,
	pub bid: Option<String>,
	pub bid_size: Option<String>,
	pub net_change: Option<String>,
	pub net_change_pct: Option<String>,
	pub volume: Option<String>,
	pub trade_time: Option<String>,
	pub market_flags: Option<MarketFlags>,
}

/// Trading state flags attached to a quote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MarketFlags {
	pub is_bats: bool,
	pub is_delayed: bool,
	pub is_halted: bool,
	pub is_hard_to_borrow: bool,
}

/// Response of the quote snapshot endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QuoteSnapshot {
	pub quotes: Vec<Quote>,
	pub errors: Vec<ItemError>,
}

/// Static description of a tradable symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SymbolDetail {
	pub symbol: String,
	pub root: Option<String>,
	pub description: Option<String>,
	pub exchange: Option<String>,
	pub asset_type: Option<String>,
	pub country: Option<String>,
	pub currency: Option<String>,
	pub expiration_date: Option<String>,
	pub option_type: Option<String>,
	pub strike_price: Option<String>,
}

/// Response of the symbol details endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SymbolDetails {
	pub symbols: Vec<SymbolDetail>,
	pub errors: Vec<ItemError>,
}

/// Crypto pairs available for market data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SymbolNames {
	pub symbol_names: Vec<String>,
}

/// One OHLC bar.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Bar {
	pub open: String,
	pub high: String,
	pub low: String,
	pub close: String,
	pub time_stamp: String,
	pub total_volume: Option<String>,
	pub up_volume: Option<u64>,
	pub down_volume: Option<u64>,
	pub open_interest: Option<String>,
	pub is_realtime: Option<bool>,
	pub is_end_of_history: Option<bool>,
	pub bar_status: Option<String>,
}

/// Response of the bar history endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Bars {
	pub bars: Vec<Bar>,
}

/// Bar width unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarUnit {
	#[default]
	Minute,
	Daily,
	Weekly,
	Monthly,
}
impl BarUnit {
	/// Wire value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Minute => "Minute",
			Self::Daily => "Daily",
			Self::Weekly => "Weekly",
			Self::Monthly => "Monthly",
		}
	}
}

/// Window selection for bar requests.
///
/// `bars_back` and `first_date` are mutually exclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BarParams {
	pub interval: Option<u32>,
	pub unit: Option<BarUnit>,
	pub bars_back: Option<u32>,
	pub first_date: Option<String>,
	pub last_date: Option<String>,
	pub session_template: Option<String>,
}
impl BarParams {
	/// `bars_back` bars of `interval` × `unit`.
	pub fn recent(interval: u32, unit: BarUnit, bars_back: u32) -> Self {
		Self {
			interval: Some(interval),
			unit: Some(unit),
			bars_back: Some(bars_back),
			..Default::default()
		}
	}

	pub(crate) fn validate(&self) -> Result<()> {
		if self.bars_back.is_some() && self.first_date.is_some() {
			return Err(Error::InvalidRequest {
				reason: "bars_back and first_date cannot be combined".into(),
			});
		}
		if self.unit.is_some_and(|unit| unit == BarUnit::Minute)
			&& self.bars_back.is_some_and(|bars| bars > 57_600)
		{
			return Err(Error::InvalidRequest {
				reason: "bars_back cannot exceed 57600 for minute bars".into(),
			});
		}
		if self.interval.is_some_and(|interval| interval == 0) {
			return Err(Error::InvalidRequest { reason: "interval must be positive".into() });
		}

		Ok(())
	}

	pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
		let mut query = Vec::new();

		if let Some(interval) = self.interval {
			query.push(("interval", interval.to_string()));
		}
		if let Some(unit) = self.unit {
			query.push(("unit", unit.as_str().to_owned()));
		}
		if let Some(bars_back) = self.bars_back {
			query.push(("barsback", bars_back.to_string()));
		}
		if let Some(first_date) = &self.first_date {
			query.push(("firstdate", first_date.clone()));
		}
		if let Some(last_date) = &self.last_date {
			query.push(("lastdate", last_date.clone()));
		}
		if let Some(template) = &self.session_template {
			query.push(("sessiontemplate", template.clone()));
		}

		query
	}
}

/// Option expiration date.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Expiration {
	pub date: String,
	pub r#type: Option<String>,
}

/// Response of the option expirations endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Expirations {
	pub expirations: Vec<Expiration>,
}

/// Response of the option strikes endpoint; each row holds one strike per leg.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Strikes {
	pub spread_type: Option<String>,
	pub strikes: Vec<Vec<String>>,
}

/// Option spread shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SpreadType {
	pub name: String,
	pub strike_interval: bool,
	pub expiration_interval: bool,
}

/// Response of the option spread types endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SpreadTypes {
	pub spread_types: Vec<SpreadType>,
}
