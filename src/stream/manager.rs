//! Connection registry and the per-connection reconnect loop.

// std
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
// crates.io
use futures::StreamExt;
use tokio::{sync::broadcast, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::TokenSource,
	config::StreamConfig,
	obs::{self, OpKind, OpOutcome, OpSpan},
	stream::{
		ConnectOutcome, ErrorRecord, ErrorRecordKind, ReconnectPolicy, RecordStream,
		StreamConnector, StreamEvent, StreamStatus, StreamTarget, Subscription,
		event::{self, Frame, LineDecoder},
	},
};

/// Shared state of one physical connection.
pub(crate) struct Connection {
	target: StreamTarget,
	sender: Mutex<Option<broadcast::Sender<StreamEvent>>>,
	status: RwLock<StreamStatus>,
	last_heartbeat_at: RwLock<Option<OffsetDateTime>>,
	failure: RwLock<Option<(u32, String)>>,
	subscribers: AtomicUsize,
	cancel: CancellationToken,
}
impl Connection {
	fn open(
		target: StreamTarget,
		capacity: usize,
		cancel: CancellationToken,
	) -> (Self, broadcast::Receiver<StreamEvent>) {
		let (sender, receiver) = broadcast::channel(capacity.max(1));
		let connection = Self {
			target,
			sender: Mutex::new(Some(sender)),
			status: RwLock::new(StreamStatus::Connecting),
			last_heartbeat_at: RwLock::new(None),
			failure: RwLock::new(None),
			subscribers: AtomicUsize::new(0),
			cancel,
		};

		(connection, receiver)
	}

	fn receiver(&self) -> Option<broadcast::Receiver<StreamEvent>> {
		self.sender.lock().as_ref().map(broadcast::Sender::subscribe)
	}

	pub(crate) fn status(&self) -> StreamStatus {
		*self.status.read()
	}

	pub(crate) fn last_heartbeat_at(&self) -> Option<OffsetDateTime> {
		*self.last_heartbeat_at.read()
	}

	pub(crate) fn failure(&self) -> Option<Error> {
		self.failure.read().as_ref().map(|(attempts, reason)| Error::StreamDisconnected {
			target: self.target.to_string(),
			attempts: *attempts,
			reason: reason.clone(),
		})
	}

	/// `Closed` is sticky.
	fn set_status(&self, status: StreamStatus) {
		let mut current = self.status.write();

		if *current != StreamStatus::Closed {
			*current = status;
		}
	}

	fn publish(&self, event: StreamEvent) {
		if let Some(sender) = self.sender.lock().as_ref() {
			// No receivers is fine; subscribers may come and go.
			let _ = sender.send(event);
		}
	}

	fn shutdown(&self) {
		*self.status.write() = StreamStatus::Closed;

		self.cancel.cancel();
	}

	fn finish(&self) {
		*self.status.write() = StreamStatus::Closed;

		self.sender.lock().take();
	}
}

/// Live connections keyed by target.
#[derive(Default)]
pub(crate) struct Registry {
	connections: Mutex<HashMap<StreamTarget, Arc<Connection>>>,
}
impl Registry {
	/// Drops one subscriber; the last one shuts the connection down.
	pub(crate) fn release(&self, connection: &Arc<Connection>) {
		let mut connections = self.connections.lock();

		if connection.subscribers.fetch_sub(1, Ordering::SeqCst) == 1 {
			connection.shutdown();

			let live = connections.get(&connection.target);

			if live.is_some_and(|current| Arc::ptr_eq(current, connection)) {
				connections.remove(&connection.target);
			}
		}
	}

	fn forget(&self, connection: &Arc<Connection>) {
		let mut connections = self.connections.lock();

		if connections.get(&connection.target).is_some_and(|live| Arc::ptr_eq(live, connection)) {
			connections.remove(&connection.target);
		}
	}
}

enum Pump {
	Cancelled,
	Lost(String),
}

struct Driver {
	connection: Arc<Connection>,
	registry: Arc<Registry>,
	connector: Arc<dyn StreamConnector>,
	tokens: Arc<dyn TokenSource>,
	config: StreamConfig,
}
impl Driver {
	async fn run(self) {
		let terminal = self.connect_loop().await;

		self.registry.forget(&self.connection);

		if let Some((attempts, record)) = terminal {
			*self.connection.failure.write() = Some((attempts, record.message.clone()));

			obs::record_op_outcome(OpKind::Stream, OpOutcome::Failure);
			tracing::warn!(
				target = %self.connection.target,
				kind = ?record.kind,
				attempts,
				message = %record.message,
				"Stream closed."
			);

			self.connection.publish(StreamEvent::Error(record));
		} else {
			tracing::debug!(target = %self.connection.target, "Stream cancelled.");
		}

		self.connection.finish();
	}

	/// Returns `None` when cancelled, otherwise the terminal record and attempts spent.
	async fn connect_loop(&self) -> Option<(u32, ErrorRecord)> {
		let cancel = &self.connection.cancel;
		let target = &self.connection.target;
		let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
		let mut decoder = LineDecoder::default();
		let mut force_refresh = false;

		loop {
			let pending =
				if force_refresh { self.tokens.force_refresh() } else { self.tokens.valid_token() };
			let credential = tokio::select! {
				biased;
				_ = cancel.cancelled() => return None,
				token = pending => match token {
					Ok(credential) => credential,
					Err(err) =>
						return Some((
							policy.attempts(),
							ErrorRecord::terminal(
								ErrorRecordKind::Auth,
								err.to_string().trim_end_matches('.'),
							),
						)),
				},
			};

			obs::record_op_outcome(OpKind::Stream, OpOutcome::Attempt);

			let outcome = tokio::select! {
				biased;
				_ = cancel.cancelled() => return None,
				outcome = self.connector.connect(target, &credential) => outcome,
			};
			let reason = match outcome {
				ConnectOutcome::Connected(body) => {
					force_refresh = false;

					decoder.clear();
					self.connection.set_status(StreamStatus::Open);
					obs::record_op_outcome(OpKind::Stream, OpOutcome::Success);
					tracing::info!(
						target = %target,
						attempts = policy.attempts(),
						"Stream connected."
					);

					match self.pump(body, &mut decoder, &mut policy).await {
						Pump::Cancelled => return None,
						Pump::Lost(reason) => reason,
					}
				},
				ConnectOutcome::Unauthorized => {
					force_refresh = true;

					"Stream endpoint answered 401".to_owned()
				},
				ConnectOutcome::Rejected { status, body } => {
					let mut record = ErrorRecord::terminal(
						ErrorRecordKind::Rejected,
						format!("Stream endpoint answered {status}: {}", body.trim()),
					);

					record.code = Some(status.to_string());

					return Some((policy.attempts(), record));
				},
				ConnectOutcome::Transient(reason) => reason,
			};
			let Some(delay) = policy.next_delay() else {
				return Some((
					policy.attempts(),
					ErrorRecord::terminal(
						ErrorRecordKind::Disconnected,
						format!("Reconnect attempts exhausted; last failure: {reason}"),
					),
				));
			};

			self.connection.set_status(StreamStatus::Reconnecting);
			obs::record_op_outcome(OpKind::Stream, OpOutcome::Retry);
			tracing::warn!(
				target = %target,
				attempt = policy.attempts(),
				delay_ms = delay.as_millis() as u64,
				%reason,
				"Stream connection lost; reconnecting."
			);

			tokio::select! {
				biased;
				_ = cancel.cancelled() => return None,
				_ = tokio::time::sleep(delay) => {},
			}
		}
	}

	async fn pump(
		&self,
		mut body: RecordStream,
		decoder: &mut LineDecoder,
		policy: &mut ReconnectPolicy,
	) -> Pump {
		let cancel = &self.connection.cancel;
		let timeout = self.config.heartbeat_timeout;
		let mut deadline = Instant::now() + timeout;

		loop {
			let chunk = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Pump::Cancelled,
				_ = tokio::time::sleep_until(deadline) =>
					return Pump::Lost(format!("No record within {} ms", timeout.as_millis())),
				chunk = body.next() => chunk,
			};
			let bytes = match chunk {
				Some(Ok(bytes)) => bytes,
				Some(Err(err)) => return Pump::Lost(format!("Stream read failed: {err}")),
				None => return Pump::Lost("Server ended the stream".into()),
			};

			for line in decoder.push(&bytes) {
				deadline = Instant::now() + timeout;

				policy.reset();

				match event::parse_line(&line) {
					Frame::GoAway => return Pump::Lost("Server asked for a reconnect".into()),
					Frame::Event(event) => {
						if matches!(event, StreamEvent::Heartbeat(_)) {
							*self.connection.last_heartbeat_at.write() =
								Some(OffsetDateTime::now_utc());
						}

						self.connection.publish(event);
					},
				}
			}
		}
	}
}

/// Opens, shares and supervises streaming connections.
pub struct StreamManager {
	connector: Arc<dyn StreamConnector>,
	tokens: Arc<dyn TokenSource>,
	config: StreamConfig,
	registry: Arc<Registry>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
	next_id: AtomicU64,
	cancel: CancellationToken,
}
impl StreamManager {
	/// Creates a manager that authenticates connections through `tokens`.
	pub fn new(
		connector: Arc<dyn StreamConnector>,
		tokens: Arc<dyn TokenSource>,
		config: StreamConfig,
	) -> Self {
		Self {
			connector,
			tokens,
			config,
			registry: Default::default(),
			tasks: Mutex::default(),
			next_id: AtomicU64::new(1),
			cancel: CancellationToken::new(),
		}
	}

	/// Ties every connection and subscription to `cancel`.
	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;

		self
	}

	/// Subscribes to `target`, joining its connection when one is already open.
	///
	/// Must be called within a Tokio runtime.
	pub fn subscribe(&self, target: StreamTarget) -> Result<Subscription> {
		if self.cancel.is_cancelled() {
			return Err(Error::SessionClosed);
		}

		let mut connections = self.registry.connections.lock();
		let joined = connections
			.get(&target)
			.and_then(|live| live.receiver().map(|receiver| (Arc::clone(live), receiver)));
		let (connection, receiver) = match joined {
			Some(joined) => joined,
			None => {
				if connections.len() >= self.config.max_concurrent_streams {
					return Err(Error::StreamLimit { limit: self.config.max_concurrent_streams });
				}

				let (connection, receiver) = Connection::open(
					target.clone(),
					self.config.channel_capacity,
					self.cancel.child_token(),
				);
				let connection = Arc::new(connection);
				let driver = Driver {
					connection: Arc::clone(&connection),
					registry: Arc::clone(&self.registry),
					connector: Arc::clone(&self.connector),
					tokens: Arc::clone(&self.tokens),
					config: self.config.clone(),
				};
				let span = OpSpan::new(OpKind::Stream, "connection");
				let mut tasks = self.tasks.lock();

				tasks.retain(|task| !task.is_finished());
				tasks.push(tokio::spawn(span.instrument(driver.run())));
				connections.insert(target.clone(), Arc::clone(&connection));

				(connection, receiver)
			},
		};

		connection.subscribers.fetch_add(1, Ordering::SeqCst);

		let id = self.next_id.fetch_add(1, Ordering::Relaxed);

		tracing::debug!(id, target = %target, "Subscribed to stream.");

		Ok(Subscription::new(
			id,
			target,
			connection,
			receiver,
			Arc::clone(&self.registry),
			self.cancel.child_token(),
		))
	}

	/// Physical connections currently open or reconnecting.
	pub fn active_connections(&self) -> usize {
		self.registry.connections.lock().len()
	}

	/// Returns `true` once [`StreamManager::close`] ran.
	pub fn is_closed(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Cancels every subscription and waits for connection tasks to exit. Idempotent.
	pub async fn close(&self) {
		self.cancel.cancel();

		let tasks = std::mem::take(&mut *self.tasks.lock());

		for task in tasks {
			if let Err(err) = task.await {
				tracing::warn!(error = %err, "Stream task ended abnormally.");
			}
		}
	}
}
impl Drop for StreamManager {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}
impl Debug for StreamManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StreamManager")
			.field("config", &self.config)
			.field("active_connections", &self.active_connections())
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}
