// crates.io
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::ValidationError};

/// Successful response with its body fully read.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	status: u16,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl ApiResponse {
	pub(crate) fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
		Self { status, headers, body }
	}

	/// HTTP status code.
	pub fn status(&self) -> u16 {
		self.status
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Raw body bytes.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Validates the body into `T`, reporting the failing JSON path on mismatch.
	pub fn json<T>(&self) -> Result<T, ValidationError>
	where
		T: DeserializeOwned,
	{
		ValidationError::parse(&self.body, Some(self.status))
	}
}
