//! `/v3/brokerage` endpoints.

// crates.io
use time::{Date, macros::format_description};
// self
use crate::{
	_prelude::*,
	client::TradeStationClient,
	executor::RequestDescriptor,
	models::brokerage::{Accounts, Balances, BodBalances, OrderPage, Orders, Positions},
	services,
	stream::{StreamTarget, Subscription},
};

/// Accounts accepted by one request.
pub const MAX_ACCOUNTS: usize = 25;
/// Order IDs accepted by one lookup.
pub const MAX_ORDER_IDS: usize = 50;
/// Largest order page.
pub const MAX_PAGE_SIZE: u32 = 600;

/// Accounts, balances, positions and orders.
#[derive(Clone, Copy, Debug)]
pub struct Brokerage<'a> {
	client: &'a TradeStationClient,
}
impl<'a> Brokerage<'a> {
	pub(crate) fn new(client: &'a TradeStationClient) -> Self {
		Self { client }
	}

	/// Accounts the credential can access.
	pub async fn accounts(&self) -> Result<Accounts> {
		self.client.execute_json(&RequestDescriptor::get("/v3/brokerage/accounts")).await
	}

	/// Real-time balances.
	pub async fn balances<S>(&self, account_ids: &[S]) -> Result<Balances>
	where
		S: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;

		let request = RequestDescriptor::get(format!("/v3/brokerage/accounts/{accounts}/balances"));

		self.client.execute_json(&request).await
	}

	/// Beginning-of-day balances.
	pub async fn balances_bod<S>(&self, account_ids: &[S]) -> Result<BodBalances>
	where
		S: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;

		self.client
			.execute_json(&RequestDescriptor::get(format!(
				"/v3/brokerage/accounts/{accounts}/bodbalances"
			)))
			.await
	}

	/// Open positions, optionally filtered by a symbol expression such as `MSFT*`.
	pub async fn positions<S>(&self, account_ids: &[S], symbol: Option<&str>) -> Result<Positions>
	where
		S: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;
		let request = RequestDescriptor::get(format!("/v3/brokerage/accounts/{accounts}/positions"))
			.with_optional_query("symbol", symbol);

		self.client.execute_json(&request).await
	}

	/// Today's orders and open orders.
	pub async fn orders<S>(&self, account_ids: &[S], page: &OrderPage) -> Result<Orders>
	where
		S: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;
		let request = RequestDescriptor::get(format!("/v3/brokerage/accounts/{accounts}/orders"));
		let request = paged(request, page)?;

		self.client.execute_json(&request).await
	}

	/// Today's orders with the given IDs.
	pub async fn orders_by_id<S, O>(&self, account_ids: &[S], order_ids: &[O]) -> Result<Orders>
	where
		S: AsRef<str>,
		O: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;
		let orders = services::join_list("order ID", order_ids, MAX_ORDER_IDS)?;

		self.client
			.execute_json(&RequestDescriptor::get(format!(
				"/v3/brokerage/accounts/{accounts}/orders/{orders}"
			)))
			.await
	}

	/// Closed orders since `since`, at most 90 days back.
	pub async fn historical_orders<S>(
		&self,
		account_ids: &[S],
		since: Date,
		page: &OrderPage,
	) -> Result<Orders>
	where
		S: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;
		let request = paged(
			RequestDescriptor::get(format!("/v3/brokerage/accounts/{accounts}/historicalorders"))
				.with_query("since", format_date(since)?),
			page,
		)?;

		self.client.execute_json(&request).await
	}

	/// Closed orders with the given IDs since `since`.
	pub async fn historical_orders_by_id<S, O>(
		&self,
		account_ids: &[S],
		order_ids: &[O],
		since: Date,
	) -> Result<Orders>
	where
		S: AsRef<str>,
		O: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;
		let orders = services::join_list("order ID", order_ids, MAX_ORDER_IDS)?;
		let request = RequestDescriptor::get(format!(
			"/v3/brokerage/accounts/{accounts}/historicalorders/{orders}"
		))
		.with_query("since", format_date(since)?);

		self.client.execute_json(&request).await
	}

	/// Streams order updates.
	pub fn stream_orders<S>(&self, account_ids: &[S]) -> Result<Subscription>
	where
		S: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;

		let target = StreamTarget::new(format!("/v3/brokerage/stream/accounts/{accounts}/orders"));

		self.client.subscribe(target)
	}

	/// Streams updates of the given orders.
	pub fn stream_orders_by_id<S, O>(
		&self,
		account_ids: &[S],
		order_ids: &[O],
	) -> Result<Subscription>
	where
		S: AsRef<str>,
		O: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;
		let orders = services::join_list("order ID", order_ids, MAX_ORDER_IDS)?;

		self.client.subscribe(StreamTarget::new(format!(
			"/v3/brokerage/stream/accounts/{accounts}/orders/{orders}"
		)))
	}

	/// Streams position updates; with `changes`, only changed fields after the snapshot.
	pub fn stream_positions<S>(&self, account_ids: &[S], changes: bool) -> Result<Subscription>
	where
		S: AsRef<str>,
	{
		let accounts = accounts(account_ids)?;
		let mut target =
			StreamTarget::new(format!("/v3/brokerage/stream/accounts/{accounts}/positions"));

		if changes {
			target = target.with_query("changes", "true");
		}

		self.client.subscribe(target)
	}
}

fn accounts<S>(account_ids: &[S]) -> Result<String>
where
	S: AsRef<str>,
{
	services::join_list("account ID", account_ids, MAX_ACCOUNTS)
}

fn paged(request: RequestDescriptor, page: &OrderPage) -> Result<RequestDescriptor> {
	if let Some(size) = page.page_size
		&& !(1..=MAX_PAGE_SIZE).contains(&size)
	{
		return Err(Error::InvalidRequest {
			reason: format!("page_size must be within 1..={MAX_PAGE_SIZE}, got {size}"),
		});
	}

	Ok(request
		.with_optional_query("pageSize", page.page_size)
		.with_optional_query("nextToken", page.next_token.as_deref()))
}

fn format_date(date: Date) -> Result<String> {
	date.format(format_description!("[year]-[month]-[day]")).map_err(|err| Error::InvalidRequest {
		reason: format!("date is not representable: {err}"),
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::date;
	// self
	use super::*;

	#[test]
	fn dates_use_iso_calendar_format() {
		assert_eq!(format_date(date!(2025 - 03 - 07)).expect("Date should format."), "2025-03-07");
	}

	#[test]
	fn page_size_is_bounded() {
		let request = RequestDescriptor::get("/v3/brokerage/accounts/1/orders");

		assert!(matches!(
			paged(request.clone(), &OrderPage { page_size: Some(0), next_token: None }),
			Err(Error::InvalidRequest { .. })
		));

		let page = OrderPage { page_size: Some(50), next_token: Some("n".into()) };
		let request = paged(request, &page).expect("Page should apply.");

		assert_eq!(
			request.query(),
			&[("pageSize".to_owned(), "50".to_owned()), ("nextToken".to_owned(), "n".to_owned())]
		);
	}
}
