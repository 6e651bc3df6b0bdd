//! Async TradeStation v3 client core: coalesced OAuth token refresh, quota-aware request
//! execution, and self-healing streaming subscriptions behind one session object.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod models;
pub mod oauth;
pub mod obs;
pub mod rate_limit;
pub mod services;
pub mod stream;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicU32, Ordering},
	};
	// crates.io
	use futures::{StreamExt, future, stream};
	// self
	use crate::{
		auth::{Credential, TokenFuture, TokenManager, TokenSource},
		client::TradeStationClient,
		config::{ClientConfig, Environment},
		error::AuthError,
		http::ReqwestHttpClient,
		stream::{ConnectFuture, ConnectOutcome, RecordStream, StreamConnector, StreamTarget},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Token transport counterpart of [`test_reqwest_client`].
	pub fn test_token_http_client() -> ReqwestHttpClient {
		ReqwestHttpClient::with_client(test_reqwest_client())
	}

	/// Configuration pointing both the API and the token endpoint at a mock server.
	pub fn test_config(base_url: &str) -> ClientConfig {
		let base = Url::parse(base_url).expect("Mock base URL should parse.");
		let token_url = base.join("/oauth/token").expect("Mock token URL should join.");

		ClientConfig::new("test-client", Environment::Simulation)
			.with_client_secret("test-secret")
			.with_refresh_token("test-refresh")
			.with_base_url(base)
			.with_token_url(token_url)
	}

	/// Credential valid for an hour with the provided access token.
	pub fn fresh_credential(access: &str) -> Credential {
		Credential::builder()
			.access_token(access)
			.refresh_token("test-refresh")
			.issued_now()
			.expires_in(Duration::hours(1))
			.build()
			.expect("Fixture credential should build.")
	}

	/// Bearer token a credential would attach.
	pub fn bearer_of(credential: &Credential) -> String {
		credential.access_token().expose().to_owned()
	}

	/// Builds a token manager backed by the insecure test transport.
	pub fn test_token_manager(config: &ClientConfig) -> TokenManager {
		TokenManager::with_http_client(config, test_token_http_client())
			.expect("Test token manager should build.")
	}

	/// Builds a session whose HTTP traffic goes to `base_url`.
	pub fn test_client(base_url: &str) -> TradeStationClient {
		TradeStationClient::with_http_clients(
			test_config(base_url),
			test_reqwest_client(),
			test_token_http_client(),
		)
		.expect("Test client should build.")
	}

	/// Token source that hands out a fixed credential and counts forced refreshes.
	#[derive(Debug)]
	pub struct StaticTokenSource {
		credential: RwLock<Credential>,
		refreshed: Option<Credential>,
		forced: AtomicU32,
	}
	impl StaticTokenSource {
		/// Always returns `access`.
		pub fn new(access: &str) -> Self {
			Self {
				credential: RwLock::new(fresh_credential(access)),
				refreshed: None,
				forced: AtomicU32::new(0),
			}
		}

		/// Switches to `refreshed` after the first forced refresh.
		pub fn rotating(access: &str, refreshed: &str) -> Self {
			Self { refreshed: Some(fresh_credential(refreshed)), ..Self::new(access) }
		}

		/// Number of forced refreshes observed.
		pub fn forced_refreshes(&self) -> u32 {
			self.forced.load(Ordering::SeqCst)
		}
	}
	impl TokenSource for StaticTokenSource {
		fn valid_token(&self) -> TokenFuture<'_> {
			let credential = self.credential.read().clone();

			Box::pin(async move { Ok(credential) })
		}

		fn force_refresh(&self) -> TokenFuture<'_> {
			self.forced.fetch_add(1, Ordering::SeqCst);

			if let Some(next) = &self.refreshed {
				*self.credential.write() = next.clone();
			}

			let credential = self.credential.read().clone();

			Box::pin(async move { Ok::<_, AuthError>(credential) })
		}
	}

	/// One scripted reaction of [`ScriptedConnector`].
	#[derive(Clone, Debug)]
	pub enum Script {
		/// Accept the connection and emit these lines, then stay silent.
		Lines(Vec<String>),
		/// Accept the connection, emit these lines, then end the body.
		LinesThenEnd(Vec<String>),
		/// Fail the connection attempt with a transient error.
		Fail,
		/// Answer the connection attempt with 401.
		Unauthorized,
		/// Reject the connection with the given status.
		Reject(u16),
		/// Leave the connection attempt pending until the stream is cancelled.
		Stall,
	}
	impl Script {
		/// [`Script::Lines`] from string slices.
		pub fn lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
			Self::Lines(lines.into_iter().map(str::to_owned).collect())
		}
	}

	/// Connector that replays a script of connection outcomes and records each attempt.
	///
	/// Once the script runs out every further attempt fails transiently.
	#[derive(Debug, Default)]
	pub struct ScriptedConnector {
		script: Mutex<VecDeque<Script>>,
		tokens: Mutex<Vec<String>>,
	}
	impl ScriptedConnector {
		/// Creates a connector that plays `script` in order.
		pub fn new(script: impl IntoIterator<Item = Script>) -> Self {
			Self { script: Mutex::new(script.into_iter().collect()), tokens: Mutex::default() }
		}

		/// Number of connection attempts made so far.
		pub fn attempts(&self) -> usize {
			self.tokens.lock().len()
		}

		/// Access tokens presented on each attempt.
		pub fn presented_tokens(&self) -> Vec<String> {
			self.tokens.lock().clone()
		}
	}
	impl StreamConnector for ScriptedConnector {
		fn connect<'a>(
			&'a self,
			_target: &'a StreamTarget,
			credential: &'a Credential,
		) -> ConnectFuture<'a> {
			self.tokens.lock().push(credential.access_token().expose().to_owned());

			let next = self.script.lock().pop_front().unwrap_or(Script::Fail);

			Box::pin(async move {
				let (lines, end) = match next {
					Script::Fail => return ConnectOutcome::Transient("Scripted failure".into()),
					Script::Unauthorized => return ConnectOutcome::Unauthorized,
					Script::Reject(status) =>
						return ConnectOutcome::Rejected {
							status,
							body: "Scripted rejection".into(),
						},
					Script::Lines(lines) => (lines, false),
					Script::LinesThenEnd(lines) => (lines, true),
					Script::Stall => return future::pending().await,
				};
				let chunks = stream::iter(
					lines
						.into_iter()
						.map(|line| Ok::<_, std::io::Error>(format!("{line}\n").into_bytes()))
						.collect::<Vec<_>>(),
				);
				let body: RecordStream =
					if end { Box::pin(chunks) } else { Box::pin(chunks.chain(stream::pending())) };

				ConnectOutcome::Connected(body)
			})
		}
	}

	/// Wraps a token source for APIs that expect a trait object.
	pub fn shared<T>(source: T) -> Arc<dyn TokenSource>
	where
		T: 'static + TokenSource,
	{
		Arc::new(source)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
