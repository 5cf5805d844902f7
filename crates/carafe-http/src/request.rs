use crate::extensions::Extensions;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri, Version};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// One inbound HTTP request.
#[derive(Debug)]
pub struct Request {
	pub method: Method,
	pub uri: Uri,
	pub version: Version,
	pub headers: HeaderMap,
	pub body: Bytes,
	extensions: Extensions,
}

impl Request {
	/// Start building a request
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Request;
	/// use http::Method;
	///
	/// let request = Request::builder()
	///     .method(Method::POST)
	///     .uri("/api/users?page=2")
	///     .header("Host", "example.com")
	///     .body("{}")
	///     .build()
	///     .unwrap();
	///
	/// assert_eq!(request.method, Method::POST);
	/// assert_eq!(request.path(), "/api/users");
	/// assert_eq!(request.host(), Some("example.com"));
	/// ```
	pub fn builder() -> RequestBuilder {
		RequestBuilder::default()
	}

	/// Get the request path
	pub fn path(&self) -> &str {
		self.uri.path()
	}

	/// Get the raw query string, if any
	pub fn query(&self) -> Option<&str> {
		self.uri.query()
	}

	/// The host the request was addressed to
	///
	/// Prefers the `Host` header and falls back to the URI authority.
	pub fn host(&self) -> Option<&str> {
		self.headers
			.get(http::header::HOST)
			.and_then(|value| value.to_str().ok())
			.or_else(|| self.uri.authority().map(|authority| authority.as_str()))
	}

	/// Get URL-decoded query parameters
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Request;
	///
	/// let request = Request::builder()
	///     .uri("/search?q=hello%20world&page=2")
	///     .build()
	///     .unwrap();
	///
	/// let params = request.query_params();
	/// assert_eq!(params.get("q"), Some(&"hello world".to_string()));
	/// assert_eq!(params.get("page"), Some(&"2".to_string()));
	/// ```
	pub fn query_params(&self) -> HashMap<String, String> {
		self.uri
			.query()
			.map(|query| {
				query
					.split('&')
					.filter(|pair| !pair.is_empty())
					.map(|pair| {
						// Split on first '=' only to preserve '=' in values
						let mut parts = pair.splitn(2, '=');
						let key = parts.next().unwrap_or_default();
						let value = parts.next().unwrap_or_default();
						(decode(key), decode(value))
					})
					.collect()
			})
			.unwrap_or_default()
	}

	/// Type-keyed storage attached to this request
	pub fn extensions(&self) -> &Extensions {
		&self.extensions
	}
}

fn decode(raw: &str) -> String {
	percent_decode_str(&raw.replace('+', " "))
		.decode_utf8_lossy()
		.into_owned()
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
	method: Method,
	uri: String,
	version: Version,
	headers: Vec<(String, String)>,
	header_map: HeaderMap,
	body: Bytes,
}

impl Default for RequestBuilder {
	fn default() -> Self {
		Self {
			method: Method::GET,
			uri: "/".to_string(),
			version: Version::HTTP_11,
			headers: Vec::new(),
			header_map: HeaderMap::new(),
			body: Bytes::new(),
		}
	}
}

impl RequestBuilder {
	pub fn method(mut self, method: Method) -> Self {
		self.method = method;
		self
	}

	pub fn uri(mut self, uri: impl Into<String>) -> Self {
		self.uri = uri.into();
		self
	}

	pub fn version(mut self, version: Version) -> Self {
		self.version = version;
		self
	}

	/// Append one header; validated when the request is built
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	/// Merge an already validated header map
	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.header_map.extend(headers);
		self
	}

	pub fn body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Validate the URI and headers and produce the request
	///
	/// # Errors
	///
	/// Returns an error if the URI or a header name/value is invalid.
	pub fn build(self) -> Result<Request, http::Error> {
		let uri: Uri = self.uri.parse()?;
		let mut headers = self.header_map;
		for (name, value) in self.headers {
			let name = HeaderName::from_bytes(name.as_bytes())?;
			let value = HeaderValue::from_str(&value)?;
			headers.append(name, value);
		}
		Ok(Request {
			method: self.method,
			uri,
			version: self.version,
			headers,
			body: self.body,
			extensions: Extensions::new(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_builder_defaults() {
		let request = Request::builder().build().unwrap();

		assert_eq!(request.method, Method::GET);
		assert_eq!(request.path(), "/");
		assert!(request.body.is_empty());
		assert_eq!(request.host(), None);
	}

	#[rstest]
	fn test_host_from_absolute_uri() {
		let request = Request::builder()
			.uri("http://api.example.com/users")
			.build()
			.unwrap();

		assert_eq!(request.host(), Some("api.example.com"));
		assert_eq!(request.path(), "/users");
	}

	#[rstest]
	fn test_invalid_header_fails_build() {
		let result = Request::builder().header("bad header", "x").build();
		assert!(result.is_err());
	}

	#[rstest]
	fn test_query_plus_decodes_to_space() {
		let request = Request::builder().uri("/?name=John+Doe").build().unwrap();
		assert_eq!(
			request.query_params().get("name"),
			Some(&"John Doe".to_string())
		);
	}
}
