//! Opening authenticated streaming connections.

// crates.io
use futures::{Stream, TryStreamExt};
use reqwest::header::ACCEPT;
// self
use crate::{_prelude::*, auth::Credential, http, stream::StreamTarget};

/// Media type the streaming endpoints answer with.
pub const STREAM_MEDIA_TYPE: &str = "application/vnd.tradestation.streams.v2+json";

/// Raw body chunks of an open connection.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, std::io::Error>> + Send>>;

/// Boxed future returned by [`StreamConnector::connect`].
pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = ConnectOutcome> + 'a + Send>>;

/// Result of one connection attempt.
pub enum ConnectOutcome {
	/// Server accepted the subscription; records follow on the body.
	Connected(RecordStream),
	/// Server answered 401; the next attempt should present a refreshed token.
	Unauthorized,
	/// Server refused the subscription and retrying cannot help.
	Rejected {
		/// HTTP status.
		status: u16,
		/// Response body, verbatim.
		body: String,
	},
	/// Attempt failed for a reason worth retrying.
	Transient(String),
}
impl Debug for ConnectOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Connected(_) => f.write_str("Connected(..)"),
			Self::Unauthorized => f.write_str("Unauthorized"),
			Self::Rejected { status, body } =>
				f.debug_struct("Rejected").field("status", status).field("body", body).finish(),
			Self::Transient(reason) => f.debug_tuple("Transient").field(reason).finish(),
		}
	}
}

/// Opens the physical connection behind a [`StreamTarget`].
///
/// [`ReqwestStreamConnector`] is the production implementation; the stream manager only
/// depends on this trait.
pub trait StreamConnector
where
	Self: Send + Sync,
{
	/// Issues the subscription request for `target` authenticated with `credential`.
	fn connect<'a>(&'a self, target: &'a StreamTarget, credential: &'a Credential)
	-> ConnectFuture<'a>;
}

/// Streams over chunked HTTP GET responses.
///
/// The wrapped client must not carry a total request timeout, or long-lived connections
/// would be cut.
#[derive(Clone, Debug)]
pub struct ReqwestStreamConnector {
	http: ReqwestClient,
	base_url: Url,
}
impl ReqwestStreamConnector {
	/// Resolves stream paths against `base_url`.
	pub fn new(http: ReqwestClient, base_url: Url) -> Self {
		Self { http, base_url }
	}
}
impl StreamConnector for ReqwestStreamConnector {
	fn connect<'a>(
		&'a self,
		target: &'a StreamTarget,
		credential: &'a Credential,
	) -> ConnectFuture<'a> {
		Box::pin(async move {
			let url = match self.base_url.join(target.path()) {
				Ok(url) => url,
				Err(err) =>
					return ConnectOutcome::Rejected {
						status: 400,
						body: format!("Stream path `{}` is invalid: {err}", target.path()),
					},
			};
			let mut builder = self.http.get(url).header(ACCEPT, STREAM_MEDIA_TYPE);

			if !target.query().is_empty() {
				builder = builder.query(target.query());
			}

			let response = match credential.attach(builder).send().await {
				Ok(response) => response,
				Err(err) => return ConnectOutcome::Transient(format!("Connect failed: {err}")),
			};
			let status = response.status().as_u16();

			if response.status().is_success() {
				let body = response
					.bytes_stream()
					.map_ok(|chunk| chunk.to_vec())
					.map_err(std::io::Error::other);

				return ConnectOutcome::Connected(Box::pin(body));
			}
			if status == 401 {
				return ConnectOutcome::Unauthorized;
			}

			let body = response.text().await.unwrap_or_default();

			if http::is_transient_status(status) {
				ConnectOutcome::Transient(format!("Stream endpoint answered {status}"))
			} else {
				ConnectOutcome::Rejected { status, body }
			}
		})
	}
}
