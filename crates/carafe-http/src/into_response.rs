//! The canonical conversion from handler return values to [`Response`].
//!
//! Accepted shapes:
//!
//! | value                         | status | headers        |
//! |-------------------------------|--------|----------------|
//! | `Response`                    | as is  | as is          |
//! | body (`&str`, `String`, ...)  | 200    | none           |
//! | `(body, status)`              | given  | none           |
//! | `(body, status, headers)`     | given  | appended       |
//! | `HttpError`                   | error  | default render |
//!
//! Anything else does not implement [`IntoResponse`] and is rejected at
//! compile time. Values that type-check but are malformed (a status outside
//! `100..=999`, an invalid header name) yield a [`ContractViolation`].

use crate::body::Body;
use crate::error::{ContractViolation, HttpError};
use crate::response::Response;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};

/// Conversion of a handler return value into a [`Response`].
pub trait IntoResponse {
	fn into_response(self) -> Result<Response, ContractViolation>;
}

/// Values accepted in the status position of a response tuple.
pub trait IntoStatus {
	fn into_status(self) -> Result<StatusCode, ContractViolation>;
}

/// Values accepted in the body position of a response tuple.
pub trait IntoBody {
	fn into_body(self) -> Body;
}

/// Values accepted in the headers position of a response tuple.
pub trait IntoHeaders {
	fn into_headers(self) -> Result<HeaderMap, ContractViolation>;
}

impl IntoStatus for StatusCode {
	fn into_status(self) -> Result<StatusCode, ContractViolation> {
		Ok(self)
	}
}

impl IntoStatus for u16 {
	fn into_status(self) -> Result<StatusCode, ContractViolation> {
		StatusCode::from_u16(self).map_err(|_| ContractViolation::InvalidStatus(i64::from(self)))
	}
}

impl IntoStatus for i32 {
	fn into_status(self) -> Result<StatusCode, ContractViolation> {
		u16::try_from(self)
			.ok()
			.and_then(|code| StatusCode::from_u16(code).ok())
			.ok_or(ContractViolation::InvalidStatus(i64::from(self)))
	}
}

macro_rules! impl_into_body {
	($($ty:ty),* $(,)?) => {
		$(
			impl IntoBody for $ty {
				fn into_body(self) -> Body {
					Body::from(self)
				}
			}

			impl IntoResponse for $ty {
				fn into_response(self) -> Result<Response, ContractViolation> {
					Ok(Response::ok().with_body(self))
				}
			}
		)*
	};
}

impl_into_body!(&'static str, String, Bytes, Vec<u8>);

impl IntoBody for Body {
	fn into_body(self) -> Body {
		self
	}
}

impl IntoResponse for Body {
	fn into_response(self) -> Result<Response, ContractViolation> {
		Ok(Response::ok().with_body(self))
	}
}

impl IntoResponse for () {
	fn into_response(self) -> Result<Response, ContractViolation> {
		Ok(Response::ok())
	}
}

impl IntoResponse for Response {
	fn into_response(self) -> Result<Response, ContractViolation> {
		Ok(self)
	}
}

impl IntoResponse for HttpError {
	fn into_response(self) -> Result<Response, ContractViolation> {
		Ok(self.to_response())
	}
}

impl IntoHeaders for HeaderMap {
	fn into_headers(self) -> Result<HeaderMap, ContractViolation> {
		Ok(self)
	}
}

fn header_pairs<I, K, V>(pairs: I) -> Result<HeaderMap, ContractViolation>
where
	I: IntoIterator<Item = (K, V)>,
	K: AsRef<str>,
	V: AsRef<str>,
{
	let mut headers = HeaderMap::new();
	for (name, value) in pairs {
		let name = name.as_ref();
		let invalid = || ContractViolation::InvalidHeader {
			name: name.to_string(),
		};
		let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
		let header_value = HeaderValue::from_str(value.as_ref()).map_err(|_| invalid())?;
		headers.append(header_name, header_value);
	}
	Ok(headers)
}

impl<K, V> IntoHeaders for Vec<(K, V)>
where
	K: AsRef<str>,
	V: AsRef<str>,
{
	fn into_headers(self) -> Result<HeaderMap, ContractViolation> {
		header_pairs(self)
	}
}

impl<K, V, const N: usize> IntoHeaders for [(K, V); N]
where
	K: AsRef<str>,
	V: AsRef<str>,
{
	fn into_headers(self) -> Result<HeaderMap, ContractViolation> {
		header_pairs(self)
	}
}

impl<B, S> IntoResponse for (B, S)
where
	B: IntoBody,
	S: IntoStatus,
{
	fn into_response(self) -> Result<Response, ContractViolation> {
		let (body, status) = self;
		Ok(Response::new(status.into_status()?).with_body(body.into_body()))
	}
}

impl<B, S, H> IntoResponse for (B, S, H)
where
	B: IntoBody,
	S: IntoStatus,
	H: IntoHeaders,
{
	fn into_response(self) -> Result<Response, ContractViolation> {
		let (body, status, headers) = self;
		let mut response = Response::new(status.into_status()?).with_body(body.into_body());
		let mut current = None;
		for (name, value) in headers.into_headers()? {
			// HeaderMap yields the name only for the first value of each run
			if let Some(name) = name {
				current = Some(name);
			}
			if let Some(name) = &current {
				response.headers.append(name.clone(), value);
			}
		}
		Ok(response)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_triple_round_trip() {
		let response = ("hello", 201, vec![("X-Test", "1")]).into_response().unwrap();

		assert_eq!(response.status, StatusCode::CREATED);
		assert_eq!(response.body.as_bytes(), Some(&Bytes::from("hello")));
		assert_eq!(response.header_all("x-test"), vec!["1"]);
	}

	#[rstest]
	fn test_plain_body_defaults_to_ok() {
		let response = String::from("plain").into_response().unwrap();

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(response.body.as_bytes(), Some(&Bytes::from("plain")));
	}

	#[rstest]
	fn test_pair_with_status_code() {
		let response = (Bytes::from_static(b"gone"), StatusCode::GONE)
			.into_response()
			.unwrap();

		assert_eq!(response.status, StatusCode::GONE);
	}

	#[rstest]
	fn test_response_passes_through_unchanged() {
		let original = Response::new(StatusCode::ACCEPTED).with_header("X-Kept", "yes");
		let response = original.into_response().unwrap();

		assert_eq!(response.status, StatusCode::ACCEPTED);
		assert_eq!(response.header("x-kept"), Some("yes"));
	}

	#[rstest]
	fn test_duplicate_headers_are_kept_in_order() {
		let response = ("", 200, [("Set-Cookie", "a=1"), ("Set-Cookie", "b=2")])
			.into_response()
			.unwrap();

		assert_eq!(response.header_all("set-cookie"), vec!["a=1", "b=2"]);
	}

	#[rstest]
	fn test_header_map_headers() {
		let mut headers = HeaderMap::new();
		headers.append("x-a", HeaderValue::from_static("1"));
		headers.append("x-a", HeaderValue::from_static("2"));
		let response = ("body", StatusCode::OK, headers).into_response().unwrap();

		assert_eq!(response.header_all("x-a"), vec!["1", "2"]);
	}

	#[rstest]
	#[case(0)]
	#[case(99)]
	#[case(1000)]
	#[case(-1)]
	fn test_invalid_status_is_contract_violation(#[case] status: i32) {
		let err = ("body", status).into_response().unwrap_err();
		assert_eq!(err, ContractViolation::InvalidStatus(i64::from(status)));
	}

	#[rstest]
	fn test_invalid_header_is_contract_violation() {
		let err = ("body", 200, vec![("bad name", "v")])
			.into_response()
			.unwrap_err();
		assert!(matches!(err, ContractViolation::InvalidHeader { .. }));
	}
}
