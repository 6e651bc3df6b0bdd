// crates.io
use httpmock::prelude::*;
// self
use tradestation_api::{
	_preludet::*,
	executor::RequestDescriptor,
	models::order_execution::{OrderDuration, OrderRequest, TradeAction},
	rate_limit::Category,
	stream::{STREAM_MEDIA_TYPE, StreamEvent, StreamTarget},
};

const TOKEN_BODY: &str = concat!(
	"{\"access_token\":\"access-1\",\"token_type\":\"Bearer\",\"expires_in\":1200,",
	"\"refresh_token\":\"rotated-refresh\"}",
);

async fn token_mock(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await
}

#[tokio::test]
async fn requests_share_one_refreshed_token() {
	let server = MockServer::start_async().await;
	let token = token_mock(&server).await;
	let quotes = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v3/marketdata/quotes/MSFT,AAPL")
				.header("authorization", "Bearer access-1");
			then.status(200)
				.header("content-type", "application/json")
				.header("x-ratelimit-limit", "250")
				.header("x-ratelimit-remaining", "248")
				.body("{\"Quotes\":[{\"Symbol\":\"MSFT\"},{\"Symbol\":\"AAPL\"}],\"Errors\":[]}");
		})
		.await;
	let client = test_client(&server.base_url());
	let first = client
		.market_data()
		.quote_snapshots(&["MSFT", "AAPL"])
		.await
		.expect("First snapshot should succeed.");
	let second = client
		.market_data()
		.quote_snapshots(&["MSFT", "AAPL"])
		.await
		.expect("Second snapshot should succeed.");

	token.assert_calls_async(1).await;
	quotes.assert_calls_async(2).await;

	assert_eq!(first, second);
	assert_eq!(first.quotes.len(), 2);
	assert_eq!(client.rate_limit(Category::MarketData).map(|state| state.remaining), Some(248));
	assert_eq!(
		client.refresh_token().map(|secret| secret.expose().to_owned()),
		Some("rotated-refresh".to_owned())
	);

	client.close().await;
}

#[tokio::test]
async fn invalid_arguments_never_reach_the_network() {
	let server = MockServer::start_async().await;
	let token = token_mock(&server).await;
	let client = test_client(&server.base_url());
	let empty: [&str; 0] = [];

	assert!(matches!(
		client.market_data().quote_snapshots(&empty).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		client.order_execution().cancel_order(" ").await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		client.market_data().stream_quotes(&empty),
		Err(Error::InvalidRequest { .. })
	));

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn orders_are_placed_and_cancelled() {
	let server = MockServer::start_async().await;
	let _token = token_mock(&server).await;
	let place = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v3/orderexecution/orders")
				.header("content-type", "application/json")
				.json_body(serde_json::json!({
					"AccountID": "SIM123",
					"Symbol": "MSFT",
					"Quantity": "10",
					"OrderType": "Limit",
					"TradeAction": "BUY",
					"TimeInForce": { "Duration": "DAY" },
					"Route": "Intelligent",
					"LimitPrice": "420.00"
				}));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"Orders\":[{\"OrderID\":\"1-2345-6789\",\"Message\":\"Sent order.\"}]}");
		})
		.await;
	let cancel = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/v3/orderexecution/orders/123456789");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"OrderID\":\"123456789\",\"Message\":\"Cancel request sent.\"}");
		})
		.await;
	let client = test_client(&server.base_url());
	let ticket = OrderRequest::market("SIM123", "MSFT", "10", TradeAction::Buy, OrderDuration::Day)
		.with_limit_price("420.00");
	let placed =
		client.order_execution().place_order(&ticket).await.expect("Order should be placed.");
	let order_id = &placed.orders[0].order_id;
	let cancelled =
		client.order_execution().cancel_order(order_id).await.expect("Order should be cancelled.");

	place.assert_async().await;
	cancel.assert_async().await;

	assert_eq!(order_id, "1-2345-6789");
	assert_eq!(cancelled.order_id, "123456789");
	assert!(cancelled.error.is_none());
	assert!(client.rate_limit(Category::OrderExecution).is_none());
}

#[tokio::test]
async fn streams_deliver_through_the_session() {
	let server = MockServer::start_async().await;
	let _token = token_mock(&server).await;
	let stream = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v3/marketdata/stream/quotes/MSFT")
				.header("accept", STREAM_MEDIA_TYPE)
				.header("authorization", "Bearer access-1");
			then.status(200).header("content-type", STREAM_MEDIA_TYPE).body(concat!(
				"{\"Symbol\":\"MSFT\",\"Last\":\"430.15\"}\n",
				"{\"Heartbeat\":1,\"Timestamp\":\"2025-03-07T15:30:00Z\"}\n",
			));
		})
		.await;
	let client = test_client(&server.base_url());
	let mut quotes =
		client.market_data().stream_quotes(&["MSFT"]).expect("Subscribe should succeed.");
	let first = quotes.next().await.expect("Record should arrive.");
	let second = quotes.next().await.expect("Heartbeat should arrive.");

	stream.assert_calls_async(1).await;

	assert!(matches!(first, StreamEvent::Data(_)));
	assert!(matches!(second, StreamEvent::Heartbeat(_)));
	assert_eq!(client.active_streams(), 1);

	quotes.cancel();

	assert_eq!(client.active_streams(), 0);

	client.close().await;
}

#[tokio::test]
async fn closed_session_refuses_work() {
	let server = MockServer::start_async().await;
	let token = token_mock(&server).await;
	let client = test_client(&server.base_url());

	client.close().await;
	client.close().await;

	assert!(client.is_closed());
	assert!(matches!(
		client.execute(&RequestDescriptor::get("/v3/brokerage/accounts")).await,
		Err(Error::SessionClosed)
	));
	assert!(matches!(
		client.subscribe(StreamTarget::new("/v3/brokerage/stream/accounts/SIM123/orders")),
		Err(Error::SessionClosed)
	));

	token.assert_calls_async(0).await;
}
