// crates.io
use reqwest::Method;
// self
use crate::{_prelude::*, rate_limit::Category};

/// Immutable description of one REST call.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
	method: Method,
	path: String,
	query: Vec<(String, String)>,
	body: Option<serde_json::Value>,
	category: Category,
}
impl RequestDescriptor {
	/// Creates a descriptor whose category is derived from `path`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		let path = path.into();
		let category = Category::from_path(&path);

		Self { method, path, query: Vec::new(), body: None, category }
	}

	/// `GET path`.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// `POST path`.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// `PUT path`.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// `DELETE path`.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Appends a query parameter when `value` is present.
	pub fn with_optional_query<V>(self, key: impl Into<String>, value: Option<V>) -> Self
	where
		V: Display,
	{
		match value {
			Some(value) => self.with_query(key, value),
			None => self,
		}
	}

	/// Attaches a JSON body.
	pub fn with_body(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn with_json<T>(self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let value = serde_json::to_value(body).map_err(|err| Error::InvalidRequest {
			reason: format!("request body cannot be serialized: {err}"),
		})?;

		Ok(self.with_body(value))
	}

	/// Overrides the derived rate-limit category.
	pub fn with_category(mut self, category: Category) -> Self {
		self.category = category;

		self
	}

	/// HTTP verb.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Path relative to the API host.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Query parameters in insertion order.
	pub fn query(&self) -> &[(String, String)] {
		&self.query
	}

	/// JSON body, if any.
	pub fn body(&self) -> Option<&serde_json::Value> {
		self.body.as_ref()
	}

	/// Rate-limit bucket.
	pub fn category(&self) -> Category {
		self.category
	}

	/// Returns `true` if resending the request cannot duplicate a side effect.
	pub fn is_idempotent(&self) -> bool {
		!matches!(self.method, Method::POST | Method::PATCH)
	}
}
