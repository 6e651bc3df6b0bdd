// std
use std::time::Duration as StdDuration;
// self
use tradestation_api::{
	_preludet::*,
	auth::TokenSource,
	config::{ReconnectConfig, StreamConfig},
	error::Error,
	stream::{
		ErrorRecordKind, StreamConnector, StreamEvent, StreamManager, StreamStatus, StreamTarget,
	},
};

fn config() -> StreamConfig {
	StreamConfig {
		heartbeat_timeout: StdDuration::from_secs(10),
		reconnect: ReconnectConfig {
			initial_delay: StdDuration::from_secs(1),
			max_delay: StdDuration::from_secs(8),
			multiplier: 2.0,
			jitter_factor: 0.0,
			max_attempts: 3,
		},
		channel_capacity: 64,
		max_concurrent_streams: 4,
	}
}

fn manager(
	connector: &Arc<ScriptedConnector>,
	tokens: Arc<dyn TokenSource>,
	config: StreamConfig,
) -> StreamManager {
	let connector: Arc<dyn StreamConnector> = connector.clone();

	StreamManager::new(connector, tokens, config)
}

fn quotes() -> StreamTarget {
	StreamTarget::new("/v3/marketdata/stream/quotes/MSFT")
}

fn symbol_of(event: &StreamEvent) -> Option<&str> {
	match event {
		StreamEvent::Data(value) => value.get("Symbol").and_then(|symbol| symbol.as_str()),
		_ => None,
	}
}

#[tokio::test(start_paused = true)]
async fn silent_connection_is_replaced_once() {
	let connector = Arc::new(ScriptedConnector::new([
		Script::lines(["{\"Heartbeat\":1,\"Timestamp\":\"2025-03-01T14:30:00Z\"}"]),
		Script::lines(["{\"Symbol\":\"MSFT\",\"Last\":\"430.15\"}"]),
	]));
	let manager = manager(&connector, shared(StaticTokenSource::new("access-1")), config());
	let mut subscription = manager.subscribe(quotes()).expect("Subscribe should succeed.");

	assert!(matches!(
		subscription.next().await,
		Some(StreamEvent::Heartbeat(heartbeat)) if heartbeat.sequence == 1
	));
	assert!(subscription.last_heartbeat_at().is_some());

	let event = subscription.next().await.expect("Reconnected stream should deliver.");

	assert_eq!(symbol_of(&event), Some("MSFT"));
	assert_eq!(connector.attempts(), 2);
	assert_eq!(subscription.status(), StreamStatus::Open);
	assert_eq!(manager.active_connections(), 1);
}

#[tokio::test(start_paused = true)]
async fn go_away_triggers_a_reconnect() {
	let connector = Arc::new(ScriptedConnector::new([
		Script::lines([
			"{\"Symbol\":\"MSFT\",\"Last\":\"430.15\"}",
			"{\"Symbol\":\"BAD\",\"Error\":\"INVALID SYMBOL\",\"Message\":\"Unknown symbol.\"}",
			"{\"StreamStatus\":\"GoAway\"}",
		]),
		Script::lines(["{\"Symbol\":\"MSFT\",\"Last\":\"430.20\"}"]),
	]));
	let manager = manager(&connector, shared(StaticTokenSource::new("access-1")), config());
	let mut subscription = manager.subscribe(quotes()).expect("Subscribe should succeed.");
	let first = subscription.next().await.expect("First record should arrive.");
	let Some(StreamEvent::Error(record)) = subscription.next().await else {
		panic!("Server error records should be delivered in-band.");
	};
	let second = subscription.next().await.expect("Record after the reconnect should arrive.");

	assert_eq!(symbol_of(&first), Some("MSFT"));
	assert_eq!(record.kind, ErrorRecordKind::Server);
	assert_eq!(record.code.as_deref(), Some("INVALID SYMBOL"));
	assert!(!record.terminal);
	let last = second
		.decode::<serde_json::Value>()
		.and_then(Result::ok)
		.and_then(|value| value.get("Last").cloned());

	assert_eq!(last, Some("430.20".into()));
	assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_reconnects_end_with_one_terminal_record() {
	let connector = Arc::new(ScriptedConnector::new([]));
	let manager = manager(&connector, shared(StaticTokenSource::new("access-1")), config());
	let mut subscription = manager.subscribe(quotes()).expect("Subscribe should succeed.");
	let Some(StreamEvent::Error(record)) = subscription.next().await else {
		panic!("Exhaustion should be reported in-band.");
	};

	assert_eq!(record.kind, ErrorRecordKind::Disconnected);
	assert!(record.terminal);
	assert!(subscription.next().await.is_none());
	assert!(subscription.next().await.is_none());
	assert_eq!(connector.attempts(), 4);
	assert_eq!(subscription.status(), StreamStatus::Closed);
	assert_eq!(manager.active_connections(), 0);
	assert!(matches!(
		subscription.terminal_error(),
		Some(Error::StreamDisconnected { attempts: 3, .. })
	));
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_stops_reconnecting() {
	let connector = Arc::new(ScriptedConnector::new([Script::Fail]));
	let mut config = config();

	config.reconnect.initial_delay = StdDuration::from_secs(60);

	let manager = manager(&connector, shared(StaticTokenSource::new("access-1")), config);
	let mut subscription = manager.subscribe(quotes()).expect("Subscribe should succeed.");

	tokio::time::sleep(StdDuration::from_secs(1)).await;

	assert_eq!(connector.attempts(), 1);
	assert_eq!(subscription.status(), StreamStatus::Reconnecting);

	subscription.cancel();
	subscription.cancel();

	assert_eq!(subscription.status(), StreamStatus::Closed);
	assert!(subscription.next().await.is_none());

	tokio::time::sleep(StdDuration::from_secs(300)).await;

	assert_eq!(connector.attempts(), 1);
	assert_eq!(manager.active_connections(), 0);
	assert!(subscription.terminal_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn cancel_during_a_pending_reconnect_attempt_closes_the_stream() {
	let connector = Arc::new(ScriptedConnector::new([Script::Fail, Script::Stall]));
	let manager = manager(&connector, shared(StaticTokenSource::new("access-1")), config());
	let mut subscription = manager.subscribe(quotes()).expect("Subscribe should succeed.");

	tokio::time::sleep(StdDuration::from_secs(5)).await;

	assert_eq!(connector.attempts(), 2);
	assert_eq!(subscription.status(), StreamStatus::Reconnecting);

	subscription.cancel();

	assert_eq!(subscription.status(), StreamStatus::Closed);
	assert!(subscription.next().await.is_none());

	tokio::time::sleep(StdDuration::from_secs(300)).await;

	assert_eq!(connector.attempts(), 2);
	assert_eq!(manager.active_connections(), 0);
	assert!(subscription.terminal_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_consumer_loses_the_oldest_events() {
	let lines =
		(0..10).map(|seq| format!("{{\"Symbol\":\"MSFT\",\"Seq\":{seq}}}")).collect::<Vec<_>>();
	let connector = Arc::new(ScriptedConnector::new([Script::Lines(lines)]));
	let manager = manager(
		&connector,
		shared(StaticTokenSource::new("access-1")),
		StreamConfig { channel_capacity: 4, ..config() },
	);
	let mut subscription = manager.subscribe(quotes()).expect("Subscribe should succeed.");

	tokio::time::sleep(StdDuration::from_millis(1)).await;

	let Some(StreamEvent::Data(oldest_kept)) = subscription.next().await else {
		panic!("Data should still be delivered after lagging.");
	};

	assert_eq!(oldest_kept.get("Seq").and_then(|seq| seq.as_u64()), Some(6));
	assert_eq!(subscription.dropped(), 6);
	assert_eq!(subscription.status(), StreamStatus::Open);
}

#[tokio::test(start_paused = true)]
async fn subscribers_share_one_connection() {
	let connector = Arc::new(ScriptedConnector::new([Script::lines([
		"{\"Symbol\":\"MSFT\",\"Last\":\"430.15\"}",
	])]));
	let manager = manager(&connector, shared(StaticTokenSource::new("access-1")), config());
	let mut first = manager.subscribe(quotes()).expect("First subscribe should succeed.");
	let mut second = manager.subscribe(quotes()).expect("Second subscribe should succeed.");

	assert_ne!(first.id(), second.id());
	assert_eq!(symbol_of(&first.next().await.expect("First should receive.")), Some("MSFT"));
	assert_eq!(symbol_of(&second.next().await.expect("Second should receive.")), Some("MSFT"));
	assert_eq!(connector.attempts(), 1);
	assert_eq!(manager.active_connections(), 1);

	drop(first);

	assert_eq!(manager.active_connections(), 1);
	assert_eq!(second.status(), StreamStatus::Open);

	drop(second);

	assert_eq!(manager.active_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn connection_cap_is_enforced() {
	let connector =
		Arc::new(ScriptedConnector::new([Script::Lines(Vec::new()), Script::Lines(Vec::new())]));
	let manager = manager(
		&connector,
		shared(StaticTokenSource::new("access-1")),
		StreamConfig { max_concurrent_streams: 1, ..config() },
	);
	let _quotes = manager.subscribe(quotes()).expect("First connection should open.");
	let bars =
		StreamTarget::new("/v3/marketdata/stream/barcharts/MSFT").with_query("unit", "Minute");
	let err = manager.subscribe(bars).expect_err("Second physical connection must be refused.");

	assert!(matches!(err, Error::StreamLimit { limit: 1 }));

	let _joined = manager.subscribe(quotes()).expect("Joining an open connection is not capped.");

	assert_eq!(manager.active_connections(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_connection_is_terminal() {
	let connector = Arc::new(ScriptedConnector::new([Script::Reject(404)]));
	let manager = manager(&connector, shared(StaticTokenSource::new("access-1")), config());
	let mut subscription = manager.subscribe(quotes()).expect("Subscribe should succeed.");
	let event = subscription.next().await.expect("Rejection should be reported.");

	assert!(event.is_terminal());

	let StreamEvent::Error(record) = event else {
		panic!("Rejection should be an error record.");
	};

	assert_eq!(record.kind, ErrorRecordKind::Rejected);
	assert_eq!(record.code.as_deref(), Some("404"));
	assert!(subscription.next().await.is_none());
	assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_connect_presents_a_refreshed_token() {
	let connector = Arc::new(ScriptedConnector::new([
		Script::Unauthorized,
		Script::lines(["{\"Symbol\":\"MSFT\"}"]),
	]));
	let tokens = Arc::new(StaticTokenSource::rotating("stale", "fresh"));
	let manager = manager(&connector, tokens.clone(), config());
	let mut subscription = manager.subscribe(quotes()).expect("Subscribe should succeed.");

	let delivered = subscription.next().await.expect("Reconnect should deliver.");

	assert_eq!(symbol_of(&delivered), Some("MSFT"));
	assert_eq!(connector.presented_tokens(), vec!["stale".to_owned(), "fresh".to_owned()]);
	assert_eq!(tokens.forced_refreshes(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_ends_subscriptions_and_refuses_new_ones() {
	let connector = Arc::new(ScriptedConnector::new([Script::Lines(Vec::new())]));
	let manager = manager(&connector, shared(StaticTokenSource::new("access-1")), config());
	let mut subscription = manager.subscribe(quotes()).expect("Subscribe should succeed.");

	manager.close().await;
	manager.close().await;

	assert!(manager.is_closed());
	assert!(subscription.next().await.is_none());
	assert_eq!(subscription.status(), StreamStatus::Closed);
	assert!(matches!(manager.subscribe(quotes()), Err(Error::SessionClosed)));
}
