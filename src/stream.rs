//! Long-lived streaming subscriptions.
//!
//! [`StreamManager::subscribe`] returns a [`Subscription`], a lazy sequence of
//! [`StreamEvent`]s that survives disconnects:
//!
//! - subscriptions to the same [`StreamTarget`] share one physical connection;
//! - a connection silent for longer than the heartbeat timeout is declared stale and replaced;
//! - reconnects back off exponentially and present a freshly validated token;
//! - once reconnects are exhausted, every subscriber receives one terminal
//!   [`ErrorRecord`] and the sequence ends.
//!
//! Each subscriber reads from a bounded buffer. A consumer that falls behind loses the
//! oldest buffered events first and [`Subscription::dropped`] counts them.

pub mod connector;
pub mod event;
pub mod manager;
pub mod reconnect;
pub mod subscription;
pub mod target;

pub use connector::*;
pub use event::{ErrorRecord, ErrorRecordKind, Heartbeat, StreamEvent};
pub use manager::StreamManager;
pub use reconnect::ReconnectPolicy;
pub use subscription::Subscription;
pub use target::StreamTarget;

// self
use crate::_prelude::*;

/// Lifecycle of a subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StreamStatus {
	/// First connection attempt in progress.
	#[default]
	Connecting,
	/// Records are flowing.
	Open,
	/// Connection was lost and is being re-established.
	Reconnecting,
	/// Terminal; no further events.
	Closed,
}
impl StreamStatus {
	/// Returns a stable label suitable for logging.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Connecting => "connecting",
			Self::Open => "open",
			Self::Reconnecting => "reconnecting",
			Self::Closed => "closed",
		}
	}
}
impl Display for StreamStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
