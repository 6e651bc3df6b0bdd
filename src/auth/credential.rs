//! Bearer credential with a conservative expiry and a builder that applies the safety margin.

// crates.io
use reqwest::RequestBuilder;
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value (or a blank one) was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when `issued_at + expires_in` falls outside the representable range.
	#[error("Expiry is out of the supported range.")]
	ExpiryOutOfRange,
}

/// Access credential plus the refresh token that minted it.
///
/// `expires_at` is already pulled forward by the safety margin, so a credential that is
/// valid here is valid upstream. The access token is only applied to outgoing requests
/// through [`Credential::attach`].
#[derive(Clone)]
pub struct Credential {
	access_token: TokenSecret,
	refresh_token: Option<TokenSecret>,
	issued_at: OffsetDateTime,
	expires_at: OffsetDateTime,
}
impl Credential {
	/// Returns a builder.
	pub fn builder() -> CredentialBuilder {
		CredentialBuilder::default()
	}

	/// Issued-at instant recorded when the exchange completed.
	pub fn issued_at(&self) -> OffsetDateTime {
		self.issued_at
	}

	/// Conservative expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Refresh token tied to this credential, if any.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Returns `true` if at least `grace` of validity remains at `now`.
	pub fn is_valid_for(&self, grace: Duration, now: OffsetDateTime) -> bool {
		self.expires_at - now >= grace
	}

	/// Returns `true` once `now` reached the expiry instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	/// Adds the `Authorization: Bearer` header to `request`.
	pub fn attach(&self, request: RequestBuilder) -> RequestBuilder {
		request.bearer_auth(self.access_token.expose())
	}

	pub(crate) fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`Credential`].
#[derive(Clone, Debug, Default)]
pub struct CredentialBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	safety_margin: Duration,
}
impl CredentialBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Reuses an existing refresh secret.
	pub fn refresh_secret(mut self, secret: TokenSecret) -> Self {
		self.refresh_token = Some(secret);

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Convenience helper that stamps `issued_at` with the current clock.
	pub fn issued_now(self) -> Self {
		self.issued_at(OffsetDateTime::now_utc())
	}

	/// Sets an absolute expiry instant; the safety margin is not applied to it.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the server-reported lifetime counted from `issued_at`.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Subtracts `margin` from a relative lifetime.
	pub fn safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Consumes the builder and produces a [`Credential`].
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_token = self
			.access_token
			.filter(|token| !token.is_blank())
			.ok_or(CredentialBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(lifetime)) => issued_at
				.checked_add(lifetime.saturating_sub(self.safety_margin).max(Duration::ZERO))
				.ok_or(CredentialBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(CredentialBuilderError::MissingExpiry),
		};
		let refresh_token = self.refresh_token.filter(|token| !token.is_blank());

		Ok(Credential { access_token, refresh_token, issued_at, expires_at })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn relative_expiry_subtracts_safety_margin() {
		let credential = Credential::builder()
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(20))
			.safety_margin(Duration::seconds(30))
			.build()
			.expect("Credential builder should support relative expiry.");

		assert_eq!(credential.expires_at(), macros::datetime!(2025-01-01 00:19:30 UTC));
	}

	#[test]
	fn margin_never_moves_expiry_before_issuance() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = Credential::builder()
			.access_token("access")
			.issued_at(issued)
			.expires_in(Duration::seconds(10))
			.safety_margin(Duration::minutes(1))
			.build()
			.expect("Short-lived credential should still build.");

		assert_eq!(credential.expires_at(), issued);
		assert!(credential.is_expired_at(issued));
	}

	#[test]
	fn grace_window_is_inclusive() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = Credential::builder()
			.access_token("access")
			.issued_at(issued)
			.expires_at(issued + Duration::minutes(10))
			.build()
			.expect("Credential builder should accept absolute expiry.");
		let grace = Duration::seconds(30);

		assert!(credential.is_valid_for(grace, issued + Duration::seconds(570)));
		assert!(!credential.is_valid_for(grace, issued + Duration::seconds(571)));
	}

	#[test]
	fn builder_rejects_blank_access_and_missing_expiry() {
		assert_eq!(
			Credential::builder().access_token(" ").expires_in(Duration::minutes(1)).build().err(),
			Some(CredentialBuilderError::MissingAccessToken)
		);
		assert_eq!(
			Credential::builder().access_token("a").build().err(),
			Some(CredentialBuilderError::MissingExpiry)
		);
	}

	#[test]
	fn lifetime_past_the_calendar_is_rejected() {
		assert_eq!(
			Credential::builder()
				.access_token("a")
				.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
				.expires_in(Duration::seconds(300_000_000_000))
				.build()
				.err(),
			Some(CredentialBuilderError::ExpiryOutOfRange)
		);
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let credential = Credential::builder()
			.access_token("very-secret-access")
			.refresh_token("very-secret-refresh")
			.issued_now()
			.expires_in(Duration::minutes(5))
			.build()
			.expect("Credential should build.");
		let rendered = format!("{credential:?}");

		assert!(!rendered.contains("very-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}
