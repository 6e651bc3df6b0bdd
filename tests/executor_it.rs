// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
use tokio_util::sync::CancellationToken;
// self
use tradestation_api::{
	_preludet::*,
	auth::TokenSource,
	config::RetryConfig,
	error::{AuthError, NetworkError},
	executor::{RequestDescriptor, RequestExecutor},
	http::MAX_RETRY_AFTER,
	models::market_data::QuoteSnapshot,
	rate_limit::{Category, RateLimiter},
};

fn executor(base_url: &str, tokens: Arc<dyn TokenSource>, retry: RetryConfig) -> RequestExecutor {
	RequestExecutor::new(
		test_reqwest_client(),
		Url::parse(base_url).expect("Mock base URL should parse."),
		tokens,
		Arc::new(RateLimiter::default()),
		retry,
	)
}

fn fast_retry() -> RetryConfig {
	RetryConfig {
		initial_backoff: StdDuration::from_millis(1),
		max_backoff: StdDuration::from_millis(5),
		default_retry_after: StdDuration::ZERO,
		..Default::default()
	}
}

#[tokio::test]
async fn success_attaches_bearer_and_records_quota() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v3/marketdata/quotes/MSFT")
				.header("authorization", "Bearer access-1")
				.header("accept", "application/json");
			then.status(200)
				.header("content-type", "application/json")
				.header("x-ratelimit-limit", "250")
				.header("x-ratelimit-remaining", "249")
				.header("x-ratelimit-reset", "60")
				.body("{\"Quotes\":[{\"Symbol\":\"MSFT\",\"Last\":\"430.15\"}]}");
		})
		.await;
	let executor =
		executor(&server.base_url(), shared(StaticTokenSource::new("access-1")), fast_retry());
	let snapshot = executor
		.execute_json::<QuoteSnapshot>(&RequestDescriptor::get("/v3/marketdata/quotes/MSFT"))
		.await
		.expect("Request should succeed.");

	mock.assert_async().await;

	assert_eq!(snapshot.quotes[0].symbol, "MSFT");

	let quota = executor.limiter().state(Category::MarketData).expect("Quota should be tracked.");

	assert_eq!((quota.limit, quota.remaining), (250, 249));
	assert!(quota.reset_at.is_some_and(|reset| reset > OffsetDateTime::now_utc()));
	assert!(executor.limiter().state(Category::Brokerage).is_none());
}

#[tokio::test]
async fn query_and_json_body_are_sent() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v3/orderexecution/orderconfirm")
				.query_param("dryRun", "true")
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "Symbol": "MSFT" }));
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let executor =
		executor(&server.base_url(), shared(StaticTokenSource::new("access-1")), fast_retry());
	let request = RequestDescriptor::post("/v3/orderexecution/orderconfirm")
		.with_query("dryRun", true)
		.with_body(serde_json::json!({ "Symbol": "MSFT" }));
	let response = executor.execute(&request).await.expect("Request should succeed.");

	mock.assert_async().await;

	assert_eq!(response.status(), 200);
	assert_eq!(request.category(), Category::OrderExecution);
}

#[tokio::test]
async fn unauthorized_is_retried_once_with_refreshed_token() {
	let server = MockServer::start_async().await;
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/v3/brokerage/accounts").header("authorization", "Bearer stale");
			then.status(401).body("{\"Message\":\"Access token expired.\"}");
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/v3/brokerage/accounts").header("authorization", "Bearer fresh");
			then.status(200).header("content-type", "application/json").body("{\"Accounts\":[]}");
		})
		.await;
	let source = Arc::new(StaticTokenSource::rotating("stale", "fresh"));
	let executor = executor(&server.base_url(), source.clone(), fast_retry());
	let response = executor
		.execute(&RequestDescriptor::get("/v3/brokerage/accounts"))
		.await
		.expect("Request should succeed after one refresh.");

	stale.assert_calls_async(1).await;
	fresh.assert_calls_async(1).await;

	assert_eq!(response.text(), "{\"Accounts\":[]}");
	assert_eq!(source.forced_refreshes(), 1);
}

#[tokio::test]
async fn second_unauthorized_surfaces_auth_error() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v3/brokerage/accounts");
			then.status(401);
		})
		.await;
	let source = Arc::new(StaticTokenSource::new("revoked"));
	let executor = executor(&server.base_url(), source.clone(), fast_retry());
	let err = executor
		.execute(&RequestDescriptor::get("/v3/brokerage/accounts"))
		.await
		.expect_err("Repeated 401 must fail.");

	mock.assert_calls_async(2).await;

	assert!(matches!(err, Error::Auth(AuthError::Unauthorized)));
	assert_eq!(source.forced_refreshes(), 1);
}

#[tokio::test]
async fn throttling_gives_up_after_bounded_retries() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v3/marketdata/quotes/MSFT");
			then.status(429).header("retry-after", "0");
		})
		.await;
	let executor = executor(
		&server.base_url(),
		shared(StaticTokenSource::new("access-1")),
		RetryConfig { max_rate_limit_retries: 3, ..fast_retry() },
	);
	let err = executor
		.execute(&RequestDescriptor::get("/v3/marketdata/quotes/MSFT"))
		.await
		.expect_err("Persistent 429 must fail.");

	mock.assert_calls_async(4).await;

	assert!(matches!(
		err,
		Error::RateLimitExceeded {
			category: Category::MarketData,
			attempts: 4,
			retry_after: Some(_),
		}
	));
	assert_eq!(
		executor.limiter().state(Category::MarketData).map(|state| state.remaining),
		Some(0)
	);
}

#[tokio::test]
async fn oversized_retry_after_is_clamped() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v3/brokerage/accounts");
			then.status(429).header("retry-after", "300000000000");
		})
		.await;
	let executor = executor(
		&server.base_url(),
		shared(StaticTokenSource::new("access-1")),
		RetryConfig { max_rate_limit_retries: 0, ..fast_retry() },
	);
	let request = RequestDescriptor::get("/v3/brokerage/accounts");
	let err = tokio::spawn(async move { executor.execute(&request).await })
		.await
		.expect("Executor must not panic on a huge Retry-After.")
		.expect_err("Throttled request must fail.");

	mock.assert_calls_async(1).await;

	assert!(matches!(
		err,
		Error::RateLimitExceeded { attempts: 1, retry_after: Some(hint), .. }
			if hint == MAX_RETRY_AFTER
	));
}

#[tokio::test]
async fn throttled_request_succeeds_after_the_window() {
	let server = MockServer::start_async().await;
	let mut throttled = server
		.mock_async(|when, then| {
			when.method(GET).path("/v3/marketdata/quotes/MSFT");
			then.status(429).header("retry-after", "1");
		})
		.await;
	let executor =
		executor(&server.base_url(), shared(StaticTokenSource::new("access-1")), fast_retry());
	let descriptor = RequestDescriptor::get("/v3/marketdata/quotes/MSFT");
	let pending = executor.execute(&descriptor);
	let swap = async {
		tokio::time::sleep(StdDuration::from_millis(300)).await;
		throttled.assert_calls_async(1).await;
		throttled.delete_async().await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/v3/marketdata/quotes/MSFT");
				then.status(200).header("content-type", "application/json").body("{\"Quotes\":[]}");
			})
			.await
	};
	let started = std::time::Instant::now();
	let (response, ok) = tokio::join!(pending, swap);

	assert_eq!(response.expect("Request should succeed after the window.").status(), 200);
	assert!(started.elapsed() >= StdDuration::from_millis(900));

	ok.assert_calls_async(1).await;
}

#[tokio::test]
async fn other_statuses_surface_without_retry() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v3/marketdata/symbols/NOPE");
			then.status(500)
				.header("content-type", "application/json")
				.body("{\"Message\":\"Internal failure.\"}");
		})
		.await;
	let executor =
		executor(&server.base_url(), shared(StaticTokenSource::new("access-1")), fast_retry());
	let err = executor
		.execute(&RequestDescriptor::get("/v3/marketdata/symbols/NOPE"))
		.await
		.expect_err("500 must fail.");

	mock.assert_calls_async(1).await;

	let Error::Api(api) = err else {
		panic!("500 should surface as an API error, got {err:?}.");
	};

	assert_eq!(api.status, 500);
	assert_eq!(api.message, "Internal failure");
	assert!(api.is_server_error());
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v3/marketdata/quotes/MSFT");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"Quotes\":\"nope\"}");
		})
		.await;
	let executor =
		executor(&server.base_url(), shared(StaticTokenSource::new("access-1")), fast_retry());
	let err = executor
		.execute_json::<QuoteSnapshot>(&RequestDescriptor::get("/v3/marketdata/quotes/MSFT"))
		.await
		.expect_err("Wrong shape must fail.");
	let Error::Validation(validation) = err else {
		panic!("Wrong shape should surface as a validation error, got {err:?}.");
	};

	assert_eq!(validation.source.path().to_string(), "Quotes");
	assert_eq!(validation.status, Some(200));
}

#[tokio::test]
async fn transport_failures_are_retried_then_surfaced() {
	let executor = executor(
		"http://127.0.0.1:9",
		shared(StaticTokenSource::new("access-1")),
		RetryConfig { max_network_retries: 2, ..fast_retry() },
	);
	let err = executor
		.execute(&RequestDescriptor::get("/v3/brokerage/accounts"))
		.await
		.expect_err("Unreachable host must fail.");

	assert!(matches!(err, Error::Network(NetworkError::Transport { attempts: 3, .. })));
}

#[tokio::test]
async fn cancelled_executor_rejects_requests() {
	let cancel = CancellationToken::new();
	let executor =
		executor("http://127.0.0.1:9", shared(StaticTokenSource::new("access-1")), fast_retry())
			.with_cancellation(cancel.clone());

	cancel.cancel();

	assert!(matches!(
		executor.execute(&RequestDescriptor::get("/v3/brokerage/accounts")).await,
		Err(Error::SessionClosed)
	));
}
