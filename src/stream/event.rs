//! Stream records and newline-delimited JSON framing.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{_prelude::*, error::ValidationError};

/// One unit delivered to a subscription.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
	/// Server keep-alive.
	Heartbeat(Heartbeat),
	/// Payload record (quote, bar, order update, snapshot marker, ...).
	Data(Value),
	/// Server-reported or locally detected problem.
	Error(ErrorRecord),
}
impl StreamEvent {
	/// Validates a [`StreamEvent::Data`] payload into `T`; `None` for other variants.
	pub fn decode<T>(&self) -> Option<Result<T, ValidationError>>
	where
		T: DeserializeOwned,
	{
		match self {
			Self::Data(value) => Some(ValidationError::from_value(value.clone())),
			_ => None,
		}
	}

	/// Returns `true` for the record that closes a subscription.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Error(record) if record.terminal)
	}
}

/// Keep-alive emitted by the server every few seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heartbeat {
	/// Server sequence number.
	pub sequence: u64,
	/// Server timestamp, verbatim.
	pub timestamp: Option<String>,
}

/// Category of an [`ErrorRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorRecordKind {
	/// The server sent an `Error` record.
	Server,
	/// A line could not be parsed as JSON.
	InvalidRecord,
	/// The server refused the subscription.
	Rejected,
	/// No credential could be obtained for the connection.
	Auth,
	/// Reconnect attempts were exhausted.
	Disconnected,
}

/// Error delivered in-band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorRecord {
	/// Category.
	pub kind: ErrorRecordKind,
	/// Server error code, when the server sent one.
	pub code: Option<String>,
	/// Human-readable description.
	pub message: String,
	/// `true` when no further events follow.
	pub terminal: bool,
}
impl ErrorRecord {
	pub(crate) fn terminal(kind: ErrorRecordKind, message: impl Into<String>) -> Self {
		Self { kind, code: None, message: message.into(), terminal: true }
	}
}

/// Parsed line.
#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
	Event(StreamEvent),
	/// Server asks the client to reconnect.
	GoAway,
}

/// Parses one non-empty line of the stream body.
pub(crate) fn parse_line(line: &[u8]) -> Frame {
	let value = match serde_json::from_slice::<Value>(line) {
		Ok(value) => value,
		Err(err) =>
			return Frame::Event(StreamEvent::Error(ErrorRecord {
				kind: ErrorRecordKind::InvalidRecord,
				code: None,
				message: format!("Stream record is not valid JSON: {err}"),
				terminal: false,
			})),
	};
	let Value::Object(map) = value else {
		return Frame::Event(StreamEvent::Data(value));
	};

	if let Some(sequence) = map.get("Heartbeat") {
		return Frame::Event(StreamEvent::Heartbeat(Heartbeat {
			sequence: sequence.as_u64().unwrap_or_default(),
			timestamp: map.get("Timestamp").and_then(Value::as_str).map(str::to_owned),
		}));
	}
	if map.get("StreamStatus").and_then(Value::as_str) == Some("GoAway") {
		return Frame::GoAway;
	}
	if let Some(code) = map.get("Error") {
		let code = code.as_str().map(str::to_owned).unwrap_or_else(|| code.to_string());
		let message = map.get("Message").and_then(Value::as_str).unwrap_or(&code).to_owned();

		return Frame::Event(StreamEvent::Error(ErrorRecord {
			kind: ErrorRecordKind::Server,
			code: Some(code),
			message,
			terminal: false,
		}));
	}

	Frame::Event(StreamEvent::Data(Value::Object(map)))
}

/// Splits a chunked body into complete lines.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
	buffer: Vec<u8>,
}
impl LineDecoder {
	/// Appends `chunk` and drains every complete, non-blank line.
	pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
		self.buffer.extend_from_slice(chunk);

		let mut lines = Vec::new();

		while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
			let mut line = self.buffer.drain(..=pos).collect::<Vec<_>>();

			while line.last().is_some_and(|byte| byte.is_ascii_whitespace()) {
				line.pop();
			}

			if line.iter().any(|byte| !byte.is_ascii_whitespace()) {
				lines.push(line);
			}
		}

		lines
	}

	/// Drops any partial line.
	pub(crate) fn clear(&mut self) {
		self.buffer.clear();
	}
}
