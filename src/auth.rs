//! Credential models and the session's token manager.

pub mod credential;
pub mod manager;
pub mod secret;

mod metrics;

pub use credential::*;
pub use manager::*;
pub use metrics::RefreshMetrics;
pub use secret::*;

// self
use crate::{_prelude::*, error::AuthError};

/// Boxed future returned by [`TokenSource`] methods.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Credential, AuthError>> + 'a + Send>>;

/// Supplies bearer credentials to the request executor and the stream manager.
///
/// [`TokenManager`] is the production implementation; the trait is the seam that lets both
/// consumers share one manager behind `Arc<dyn TokenSource>`.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns a credential valid for at least the configured grace window.
	fn valid_token(&self) -> TokenFuture<'_>;

	/// Replaces the cached credential through a new exchange.
	fn force_refresh(&self) -> TokenFuture<'_>;
}
