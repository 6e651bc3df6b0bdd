//! `/v3/marketdata` endpoints.

// self
use crate::{
	_prelude::*,
	client::TradeStationClient,
	executor::RequestDescriptor,
	models::market_data::{
		BarParams, Bars, Expirations, QuoteSnapshot, SpreadTypes, Strikes, SymbolDetails,
		SymbolNames,
	},
	services,
	stream::{StreamTarget, Subscription},
};

/// Symbols accepted by one quote request or stream.
pub const MAX_QUOTE_SYMBOLS: usize = 100;
/// Symbols accepted by one symbol details request.
pub const MAX_DETAIL_SYMBOLS: usize = 50;

/// Quotes, bars, symbols and options.
#[derive(Clone, Copy, Debug)]
pub struct MarketData<'a> {
	client: &'a TradeStationClient,
}
impl<'a> MarketData<'a> {
	pub(crate) fn new(client: &'a TradeStationClient) -> Self {
		Self { client }
	}

	/// Latest quote for each symbol.
	pub async fn quote_snapshots<S>(&self, symbols: &[S]) -> Result<QuoteSnapshot>
	where
		S: AsRef<str>,
	{
		let symbols = services::join_list("symbol", symbols, MAX_QUOTE_SYMBOLS)?;

		self.client
			.execute_json(&RequestDescriptor::get(format!("/v3/marketdata/quotes/{symbols}")))
			.await
	}

	/// Static details for each symbol.
	pub async fn symbol_details<S>(&self, symbols: &[S]) -> Result<SymbolDetails>
	where
		S: AsRef<str>,
	{
		let symbols = services::join_list("symbol", symbols, MAX_DETAIL_SYMBOLS)?;

		self.client
			.execute_json(&RequestDescriptor::get(format!("/v3/marketdata/symbols/{symbols}")))
			.await
	}

	/// Crypto pairs with market data.
	pub async fn crypto_symbol_names(&self) -> Result<SymbolNames> {
		self.client
			.execute_json(&RequestDescriptor::get(
				"/v3/marketdata/symbollists/cryptopairs/symbolnames",
			))
			.await
	}

	/// Historical bars for `symbol`.
	pub async fn bar_history(&self, symbol: &str, params: &BarParams) -> Result<Bars> {
		let symbol = services::require("symbol", symbol)?;

		params.validate()?;

		let request = params.query().into_iter().fold(
			RequestDescriptor::get(format!("/v3/marketdata/barcharts/{symbol}")),
			|request, (key, value)| request.with_query(key, value),
		);

		self.client.execute_json(&request).await
	}

	/// Expiration dates for options on `underlying`, optionally limited to one strike.
	pub async fn option_expirations(
		&self,
		underlying: &str,
		strike_price: Option<&str>,
	) -> Result<Expirations> {
		let underlying = services::require("underlying", underlying)?;
		let request =
			RequestDescriptor::get(format!("/v3/marketdata/options/expirations/{underlying}"))
				.with_optional_query("strikePrice", strike_price);

		self.client.execute_json(&request).await
	}

	/// Strikes for options on `underlying`, optionally for one expiration (`YYYY-MM-DD`).
	pub async fn option_strikes(
		&self,
		underlying: &str,
		expiration: Option<&str>,
	) -> Result<Strikes> {
		let underlying = services::require("underlying", underlying)?;
		let request = RequestDescriptor::get(format!("/v3/marketdata/options/strikes/{underlying}"))
			.with_optional_query("expiration", expiration);

		self.client.execute_json(&request).await
	}

	/// Spread shapes accepted by the option endpoints.
	pub async fn option_spread_types(&self) -> Result<SpreadTypes> {
		self.client
			.execute_json(&RequestDescriptor::get("/v3/marketdata/options/spreadtypes"))
			.await
	}

	/// Streams quote changes for each symbol.
	pub fn stream_quotes<S>(&self, symbols: &[S]) -> Result<Subscription>
	where
		S: AsRef<str>,
	{
		let symbols = services::join_list("symbol", symbols, MAX_QUOTE_SYMBOLS)?;

		self.client.subscribe(StreamTarget::new(format!("/v3/marketdata/stream/quotes/{symbols}")))
	}

	/// Streams bars for `symbol`; the open bar is re-sent on every update.
	pub fn stream_bars(&self, symbol: &str, params: &BarParams) -> Result<Subscription> {
		let symbol = services::require("symbol", symbol)?;

		params.validate()?;

		let target = params.query().into_iter().fold(
			StreamTarget::new(format!("/v3/marketdata/stream/barcharts/{symbol}")),
			|target, (key, value)| target.with_query(key, value),
		);

		self.client.subscribe(target)
	}

	/// Streams level 2 quotes for `symbol`.
	pub fn stream_market_depth_quotes(
		&self,
		symbol: &str,
		max_levels: Option<u32>,
	) -> Result<Subscription> {
		self.depth("quotes", symbol, max_levels)
	}

	/// Streams level 2 quotes aggregated per price level for `symbol`.
	pub fn stream_market_depth_aggregates(
		&self,
		symbol: &str,
		max_levels: Option<u32>,
	) -> Result<Subscription> {
		self.depth("aggregates", symbol, max_levels)
	}

	/// Streams the option chain of `underlying`, optionally for one expiration.
	pub fn stream_option_chain(
		&self,
		underlying: &str,
		expiration: Option<&str>,
	) -> Result<Subscription> {
		let underlying = services::require("underlying", underlying)?;
		let mut target =
			StreamTarget::new(format!("/v3/marketdata/stream/options/chains/{underlying}"));

		if let Some(expiration) = expiration {
			target = target.with_query("expiration", expiration);
		}

		self.client.subscribe(target)
	}

	fn depth(&self, kind: &str, symbol: &str, max_levels: Option<u32>) -> Result<Subscription> {
		let symbol = services::require("symbol", symbol)?;
		let mut target =
			StreamTarget::new(format!("/v3/marketdata/stream/marketdepth/{kind}/{symbol}"));

		if let Some(levels) = max_levels {
			if !(1..=50).contains(&levels) {
				return Err(Error::InvalidRequest {
					reason: format!("max_levels must be within 1..=50, got {levels}"),
				});
			}

			target = target.with_query("maxlevels", levels.to_string());
		}

		self.client.subscribe(target)
	}
}
