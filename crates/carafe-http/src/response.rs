use crate::body::Body;
use crate::error::{BoxError, ContractViolation};
use bytes::Bytes;
use futures::stream::Stream;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::Serialize;

/// HTTP Response representation
///
/// Headers keep their insertion order per name and may repeat; use
/// [`Response::with_header`] to append and [`Response::set_header`] to
/// replace.
#[derive(Debug)]
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Body,
}

impl Response {
	/// Create a new Response with the given status code
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Response;
	/// use http::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// assert!(response.body.as_bytes().unwrap().is_empty());
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Body::empty(),
		}
	}

	/// Create a Response with HTTP 200 OK status
	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	/// Create a Response with HTTP 404 Not Found status
	pub fn not_found() -> Self {
		Self::new(StatusCode::NOT_FOUND)
	}

	/// Create a Response with HTTP 500 Internal Server Error status
	pub fn internal_server_error() -> Self {
		Self::new(StatusCode::INTERNAL_SERVER_ERROR)
	}

	/// Create a redirect Response pointing at `location`
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Response;
	/// use http::StatusCode;
	///
	/// let response = Response::redirect("/login", StatusCode::FOUND);
	/// assert_eq!(response.status, StatusCode::FOUND);
	/// assert_eq!(response.header("location"), Some("/login"));
	/// ```
	pub fn redirect(location: impl AsRef<str>, status: StatusCode) -> Self {
		let mut response = Self::new(status);
		if let Ok(value) = HeaderValue::from_str(location.as_ref()) {
			response.headers.insert(header::LOCATION, value);
		}
		response
	}

	/// Set the response body
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Response;
	/// use bytes::Bytes;
	///
	/// let response = Response::ok().with_body("Hello, World!");
	/// assert_eq!(response.body.as_bytes(), Some(&Bytes::from("Hello, World!")));
	/// ```
	pub fn with_body(mut self, body: impl Into<Body>) -> Self {
		self.body = body.into();
		self
	}

	/// Replace the body with a lazily produced stream
	pub fn with_stream<S>(mut self, stream: S) -> Self
	where
		S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
	{
		self.body = Body::from_stream(stream);
		self
	}

	/// Append a header, keeping any existing values for the same name
	///
	/// Invalid names or values are ignored; use [`Response::try_with_header`]
	/// to surface them.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Response;
	///
	/// let response = Response::ok()
	///     .with_header("Set-Cookie", "a=1")
	///     .with_header("Set-Cookie", "b=2");
	/// assert_eq!(response.header_all("set-cookie"), vec!["a=1", "b=2"]);
	/// ```
	pub fn with_header(self, name: &str, value: &str) -> Self {
		match self.try_with_header(name, value) {
			Ok(response) => response,
			Err((response, _)) => response,
		}
	}

	/// Append a header, returning the violation if the name or value is invalid
	pub fn try_with_header(
		mut self,
		name: &str,
		value: &str,
	) -> Result<Self, (Self, ContractViolation)> {
		let parsed = HeaderName::from_bytes(name.as_bytes())
			.ok()
			.zip(HeaderValue::from_str(value).ok());
		match parsed {
			Some((name, value)) => {
				self.headers.append(name, value);
				Ok(self)
			}
			None => Err((
				self,
				ContractViolation::InvalidHeader {
					name: name.to_string(),
				},
			)),
		}
	}

	/// Replace every value of a header with a single value
	pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
		self.headers.insert(name, value);
	}

	/// Set the response body to JSON and add appropriate Content-Type header
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Response;
	/// use serde_json::json;
	///
	/// let response = Response::ok().with_json(&json!({"ok": true})).unwrap();
	/// assert_eq!(response.header("content-type"), Some("application/json"));
	/// ```
	pub fn with_json<T: Serialize>(mut self, data: &T) -> crate::Result<Self> {
		let json = serde_json::to_vec(data)?;
		self.body = Body::Full(Bytes::from(json));
		self.headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static("application/json"),
		);
		Ok(self)
	}

	/// The first value of a header, if present and valid UTF-8
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Every value of a header in insertion order
	pub fn header_all(&self, name: &str) -> Vec<&str> {
		self.headers
			.get_all(name)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.collect()
	}

	pub fn is_streamed(&self) -> bool {
		self.body.is_stream()
	}

	/// Drain the body into bytes, consuming the response
	pub async fn into_bytes(self) -> Result<Bytes, BoxError> {
		self.body.collect().await
	}
}
