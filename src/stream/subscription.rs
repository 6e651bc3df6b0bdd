//! Consumer handle over a shared connection.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	stream::{
		StreamEvent, StreamStatus, StreamTarget,
		manager::{Connection, Registry},
	},
};

/// Lazy sequence of [`StreamEvent`]s for one subscriber.
///
/// The handle keeps delivering across reconnects. It ends after [`Subscription::cancel`],
/// after the session closes, or after the terminal [`crate::stream::ErrorRecord`] of a
/// connection that could not be restored. Dropping the handle cancels it.
pub struct Subscription {
	id: u64,
	target: StreamTarget,
	connection: Arc<Connection>,
	receiver: broadcast::Receiver<StreamEvent>,
	registry: Arc<Registry>,
	cancel: CancellationToken,
	released: AtomicBool,
	dropped: u64,
}
impl Subscription {
	pub(crate) fn new(
		id: u64,
		target: StreamTarget,
		connection: Arc<Connection>,
		receiver: broadcast::Receiver<StreamEvent>,
		registry: Arc<Registry>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			id,
			target,
			connection,
			receiver,
			registry,
			cancel,
			released: AtomicBool::new(false),
			dropped: 0,
		}
	}

	/// Session-unique identifier.
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Subscribed target.
	pub fn target(&self) -> &StreamTarget {
		&self.target
	}

	/// Current lifecycle state.
	pub fn status(&self) -> StreamStatus {
		if self.cancel.is_cancelled() { StreamStatus::Closed } else { self.connection.status() }
	}

	/// Wall-clock time of the last heartbeat seen on the connection.
	pub fn last_heartbeat_at(&self) -> Option<OffsetDateTime> {
		self.connection.last_heartbeat_at()
	}

	/// Events skipped because this consumer fell behind the buffer.
	pub fn dropped(&self) -> u64 {
		self.dropped
	}

	/// [`Error::StreamDisconnected`] describing why the connection closed, once it has.
	pub fn terminal_error(&self) -> Option<Error> {
		self.connection.failure()
	}

	/// Waits for the next event; `None` once the subscription is over.
	pub async fn next(&mut self) -> Option<StreamEvent> {
		loop {
			let received = tokio::select! {
				biased;
				_ = self.cancel.cancelled() => return None,
				received = self.receiver.recv() => received,
			};

			match received {
				Ok(event) => return Some(event),
				Err(RecvError::Lagged(skipped)) => {
					self.dropped += skipped;

					tracing::warn!(
						id = self.id,
						target = %self.target,
						skipped,
						"Subscriber fell behind; oldest events were dropped."
					);
				},
				Err(RecvError::Closed) => return None,
			}
		}
	}

	/// Stops delivery immediately and releases the connection if this was its last
	/// subscriber. Repeated calls do nothing.
	pub fn cancel(&self) {
		self.cancel.cancel();

		if !self.released.swap(true, Ordering::SeqCst) {
			tracing::debug!(id = self.id, target = %self.target, "Subscription cancelled.");

			self.registry.release(&self.connection);
		}
	}

	/// Adapts the handle into a [`Stream`].
	pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send {
		futures::stream::unfold(self, |mut subscription| async move {
			let event = subscription.next().await?;

			Some((event, subscription))
		})
	}
}
impl Drop for Subscription {
	fn drop(&mut self) {
		self.cancel();
	}
}
impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("target", &self.target)
			.field("status", &self.status())
			.field("dropped", &self.dropped)
			.finish_non_exhaustive()
	}
}
