//! Streams quotes from a local mock that emits a snapshot, a heartbeat and two updates, and
//! decodes each record into a typed quote.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use tradestation_api::{
	client::TradeStationClient,
	config::{ClientConfig, Environment},
	models::market_data::Quote,
	stream::StreamEvent,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":1200}",
			);
		})
		.await;
	let stream_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v3/marketdata/stream/quotes/MSFT,AAPL")
				.header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/vnd.tradestation.streams.v2+json")
				.body(
					[
						"{\"Symbol\":\"MSFT\",\"Last\":\"430.10\"}",
						"{\"Symbol\":\"AAPL\",\"Last\":\"227.48\"}",
						"{\"Heartbeat\":1,\"Timestamp\":\"2025-03-07T15:30:00Z\"}",
						"{\"Symbol\":\"MSFT\",\"Last\":\"430.15\"}",
						"{\"Symbol\":\"AAPL\",\"Last\":\"227.51\"}",
						"",
					]
					.join("\n"),
				);
		})
		.await;
	let base = Url::parse(&server.base_url())?;
	let config = ClientConfig::new("demo-client", Environment::Simulation)
		.with_refresh_token("demo-refresh")
		.with_token_url(base.join("/oauth/token")?)
		.with_base_url(base);
	let client = TradeStationClient::new(config)?;
	let mut quotes = client.market_data().stream_quotes(&["MSFT", "AAPL"])?;
	let mut updates = 0;

	while updates < 4 {
		let Some(event) = quotes.next().await else { break };

		match &event {
			StreamEvent::Data(_) => {
				let quote = event.decode::<Quote>().transpose()?;

				if let Some(quote) = quote {
					println!("{} last {}.", quote.symbol, quote.last.as_deref().unwrap_or("-"));
				}

				updates += 1;
			},
			StreamEvent::Heartbeat(heartbeat) => println!("Heartbeat #{}.", heartbeat.sequence),
			StreamEvent::Error(record) => println!("Stream error: {}.", record.message),
		}
	}

	quotes.cancel();
	client.close().await;
	stream_mock.assert_async().await;

	Ok(())
}
