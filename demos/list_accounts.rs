//! Lists brokerage accounts through a session whose token endpoint and API host are served by
//! a local mock, then prints the quota the server reported.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use tradestation_api::{
	client::TradeStationClient,
	config::{ClientConfig, Environment},
	rate_limit::Category,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(concat!(
				"{\"access_token\":\"demo-access\",",
				"\"refresh_token\":\"demo-refresh-rotated\",",
				"\"token_type\":\"Bearer\",\"expires_in\":1200}",
			));
		})
		.await;
	let accounts_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v3/brokerage/accounts")
				.header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.header("x-ratelimit-limit", "250")
				.header("x-ratelimit-remaining", "249")
				.header("x-ratelimit-reset", "300")
				.body(concat!(
					"{\"Accounts\":[",
					"{\"AccountID\":\"SIM123456M\",\"AccountType\":\"Margin\",",
					"\"Currency\":\"USD\",\"Status\":\"Active\"},",
					"{\"AccountID\":\"SIM123457\",\"AccountType\":\"Cash\",",
					"\"Currency\":\"USD\",\"Status\":\"Active\"}",
					"]}",
				));
		})
		.await;
	let base = Url::parse(&server.base_url())?;
	let config = ClientConfig::new("demo-client", Environment::Simulation)
		.with_client_secret("demo-secret")
		.with_refresh_token("demo-refresh")
		.with_token_url(base.join("/oauth/token")?)
		.with_base_url(base);
	let client = TradeStationClient::new(config)?;
	let accounts = client.brokerage().accounts().await?;

	for account in &accounts.accounts {
		println!(
			"{} ({}, {}).",
			account.account_id,
			account.account_type.as_deref().unwrap_or("Unknown"),
			account.status.as_deref().unwrap_or("Unknown"),
		);
	}

	if let Some(quota) = client.rate_limit(Category::Brokerage) {
		println!(
			"Brokerage quota: {}/{} remaining, reset at {:?}.",
			quota.remaining, quota.limit, quota.reset_at
		);
	}
	if let Some(rotated) = client.refresh_token() {
		println!("Persist the rotated refresh token: {}.", rotated.expose());
	}

	client.close().await;
	token_mock.assert_async().await;
	accounts_mock.assert_async().await;

	Ok(())
}
