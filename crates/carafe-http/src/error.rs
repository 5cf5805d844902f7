//! Fault taxonomy for the request lifecycle.
//!
//! Every fault raised while handling a request is an [`Error`]:
//!
//! - [`Error::Http`] carries an intrinsic status (routing failures and
//!   [`abort`] calls) and always has a default rendering.
//! - [`Error::Handler`] wraps any error produced by user code. It can be
//!   recovered by a registered error handler; otherwise it degrades to a
//!   generic 500.
//! - [`Error::Contract`] marks a programming or integration error. It is
//!   never offered to error handlers.

use crate::into_response::IntoStatus;
use crate::response::Response;
use http::{HeaderValue, Method, StatusCode, header};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed error produced by user code.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type used throughout carafe.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Any fault raised while a request is processed.
#[derive(Debug, Error)]
pub enum Error {
	/// A condition with an intrinsic HTTP status.
	#[error(transparent)]
	Http(#[from] HttpError),

	/// A programming or integration error; fatal to the current request.
	#[error(transparent)]
	Contract(#[from] ContractViolation),

	/// A fault raised by a handler or hook.
	#[error("{0}")]
	Handler(BoxError),
}

impl Error {
	/// Wraps an arbitrary error raised by user code.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Error;
	///
	/// let err = Error::handler(std::io::Error::other("disk full"));
	/// assert!(err.is::<std::io::Error>());
	/// assert_eq!(err.status(), None);
	/// ```
	pub fn handler<E>(err: E) -> Self
	where
		E: Into<BoxError>,
	{
		Error::Handler(err.into())
	}

	/// Returns the intrinsic HTTP status, if this fault carries one.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Error::Http(err) => Some(err.status()),
			_ => None,
		}
	}

	/// Returns the HTTP error, if this is one.
	pub fn as_http(&self) -> Option<&HttpError> {
		match self {
			Error::Http(err) => Some(err),
			_ => None,
		}
	}

	pub fn is_contract_violation(&self) -> bool {
		matches!(self, Error::Contract(_))
	}

	/// Attempts to view the underlying error as a concrete type.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::{Error, HttpError};
	///
	/// let err: Error = HttpError::not_found().into();
	/// assert!(err.downcast_ref::<HttpError>().is_some());
	/// assert!(err.downcast_ref::<std::io::Error>().is_none());
	/// ```
	pub fn downcast_ref<E>(&self) -> Option<&E>
	where
		E: StdError + 'static,
	{
		match self {
			Error::Http(err) => (err as &(dyn StdError + 'static)).downcast_ref::<E>(),
			Error::Contract(err) => (err as &(dyn StdError + 'static)).downcast_ref::<E>(),
			Error::Handler(err) => err.downcast_ref::<E>(),
		}
	}

	/// Returns true if the underlying error is of type `E`.
	pub fn is<E>(&self) -> bool
	where
		E: StdError + 'static,
	{
		self.downcast_ref::<E>().is_some()
	}
}

impl From<BoxError> for Error {
	fn from(err: BoxError) -> Self {
		Error::Handler(err)
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Error::Handler(Box::new(err))
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Handler(Box::new(err))
	}
}

/// Violations of the lifecycle's structural contracts.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
	#[error("context stack mismatch: expected to pop {expected}, found {found}")]
	StackMismatch { expected: String, found: String },

	#[error("attempted to pop {0} from an empty context stack")]
	EmptyStack(String),

	#[error("no context stack is active on this task")]
	NoActiveScope,

	#[error("working outside of {0} context")]
	OutsideContext(&'static str),

	#[error("{0} was popped more often than it was pushed")]
	UnbalancedPop(String),

	#[error("{0} was already pushed")]
	AlreadyPushed(String),

	#[error("invalid status code {0}")]
	InvalidStatus(i64),

	#[error("invalid header {name:?}")]
	InvalidHeader { name: String },

	#[error("no view function is registered for endpoint {0:?}")]
	MissingView(String),
}

/// An error with an intrinsic HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
	status: StatusCode,
	description: Option<String>,
	allowed: Vec<Method>,
	location: Option<String>,
}

impl HttpError {
	/// Creates an error for the given status with its default description.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::HttpError;
	/// use http::StatusCode;
	///
	/// let err = HttpError::from_status(StatusCode::FORBIDDEN);
	/// assert_eq!(err.status(), StatusCode::FORBIDDEN);
	/// assert_eq!(err.name(), "Forbidden");
	/// ```
	pub fn from_status(status: StatusCode) -> Self {
		Self {
			status,
			description: None,
			allowed: Vec::new(),
			location: None,
		}
	}

	pub fn not_found() -> Self {
		Self::from_status(StatusCode::NOT_FOUND)
	}

	pub fn internal_server_error() -> Self {
		Self::from_status(StatusCode::INTERNAL_SERVER_ERROR)
	}

	/// A 405 error listing the methods the matched URL accepts.
	pub fn method_not_allowed(allowed: Vec<Method>) -> Self {
		Self {
			allowed,
			..Self::from_status(StatusCode::METHOD_NOT_ALLOWED)
		}
	}

	/// A redirect instruction raised as an error.
	pub fn redirect(location: impl Into<String>, status: StatusCode) -> Self {
		Self {
			location: Some(location.into()),
			..Self::from_status(status)
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// The canonical reason phrase, e.g. `"Not Found"`.
	pub fn name(&self) -> &'static str {
		self.status.canonical_reason().unwrap_or("Unknown Error")
	}

	/// The custom description, falling back to the default for the status.
	pub fn description(&self) -> &str {
		self.description
			.as_deref()
			.unwrap_or_else(|| default_description(self.status))
	}

	pub fn allowed_methods(&self) -> &[Method] {
		&self.allowed
	}

	pub fn location(&self) -> Option<&str> {
		self.location.as_deref()
	}

	pub fn is_redirect(&self) -> bool {
		self.status.is_redirection() && self.location.is_some()
	}

	/// Renders the default response for this error.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::HttpError;
	/// use http::{Method, StatusCode};
	///
	/// let response = HttpError::method_not_allowed(vec![Method::GET, Method::HEAD]).to_response();
	/// assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
	/// assert_eq!(response.header("allow"), Some("GET, HEAD"));
	/// ```
	pub fn to_response(&self) -> Response {
		let body = format!(
			"<!doctype html>\n<html lang=en>\n<title>{code} {name}</title>\n<h1>{name}</h1>\n<p>{description}</p>\n",
			code = self.status.as_u16(),
			name = self.name(),
			description = self.description(),
		);
		let mut response = Response::new(self.status).with_body(body);
		response.headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static("text/html; charset=utf-8"),
		);
		if !self.allowed.is_empty() {
			let allow = self
				.allowed
				.iter()
				.map(Method::as_str)
				.collect::<Vec<_>>()
				.join(", ");
			if let Ok(value) = HeaderValue::from_str(&allow) {
				response.headers.insert(header::ALLOW, value);
			}
		}
		if let Some(location) = &self.location
			&& let Ok(value) = HeaderValue::from_str(location)
		{
			response.headers.insert(header::LOCATION, value);
		}
		response
	}
}

impl fmt::Display for HttpError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}: {}", self.status.as_u16(), self.name(), self.description())
	}
}

impl StdError for HttpError {}

fn default_description(status: StatusCode) -> &'static str {
	match status.as_u16() {
		400 => "The browser (or proxy) sent a request that this server could not understand.",
		401 => {
			"The server could not verify that you are authorized to access the URL requested."
		}
		403 => "You don't have the permission to access the requested resource.",
		404 => {
			"The requested URL was not found on the server. If you entered the URL manually please check your spelling and try again."
		}
		405 => "The method is not allowed for the requested URL.",
		308 | 301 | 302 | 303 | 307 => "The resource has moved to a different URL.",
		500 => {
			"The server encountered an internal error and was unable to complete your request."
		}
		_ => "",
	}
}

/// Builds the fault raised by aborting a request with the given status.
///
/// An invalid status number is itself a contract violation.
///
/// # Examples
///
/// ```
/// use carafe_http::abort;
/// use http::StatusCode;
///
/// assert_eq!(abort(403).status(), Some(StatusCode::FORBIDDEN));
/// assert!(abort(1000).is_contract_violation());
/// ```
pub fn abort<S: IntoStatus>(status: S) -> Error {
	match status.into_status() {
		Ok(status) => HttpError::from_status(status).into(),
		Err(violation) => violation.into(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[derive(Debug, Error)]
	#[error("value error: {0}")]
	struct ValueError(String);

	#[rstest]
	fn test_handler_error_downcast() {
		let err = Error::handler(ValueError("bad".to_string()));

		assert!(err.is::<ValueError>());
		assert!(!err.is::<HttpError>());
		assert_eq!(err.to_string(), "value error: bad");
		assert_eq!(err.status(), None);
	}

	#[rstest]
	fn test_http_error_status() {
		let err: Error = HttpError::not_found().into();

		assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
		assert!(err.as_http().is_some());
		assert!(!err.is_contract_violation());
	}

	#[rstest]
	#[case(StatusCode::NOT_FOUND, "Not Found")]
	#[case(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")]
	#[case(StatusCode::IM_A_TEAPOT, "I'm a teapot")]
	fn test_http_error_name(#[case] status: StatusCode, #[case] name: &str) {
		assert_eq!(HttpError::from_status(status).name(), name);
	}

	#[rstest]
	fn test_default_rendering() {
		let response = HttpError::not_found().to_response();

		assert_eq!(response.status, StatusCode::NOT_FOUND);
		assert_eq!(response.header("content-type"), Some("text/html; charset=utf-8"));
		let body = String::from_utf8(response.body.as_bytes().unwrap().to_vec()).unwrap();
		assert!(body.contains("<h1>Not Found</h1>"));
	}

	#[rstest]
	fn test_custom_description() {
		let err = HttpError::from_status(StatusCode::BAD_REQUEST).with_description("missing field");
		assert_eq!(err.description(), "missing field");
	}

	#[rstest]
	fn test_redirect_sets_location() {
		let response = HttpError::redirect("/next/", StatusCode::PERMANENT_REDIRECT).to_response();

		assert_eq!(response.status, StatusCode::PERMANENT_REDIRECT);
		assert_eq!(response.header("location"), Some("/next/"));
	}

	#[rstest]
	fn test_abort_invalid_status_is_contract_violation() {
		let err = abort(42u16);
		assert!(matches!(
			err,
			Error::Contract(ContractViolation::InvalidStatus(42))
		));
	}
}
