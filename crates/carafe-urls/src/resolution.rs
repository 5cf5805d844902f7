//! The router contract consumed by the request lifecycle.

use crate::error::BuildError;
use crate::params::PathParams;
use http::{Method, StatusCode};

/// The parts of a request a router needs to match it.
#[derive(Debug, Clone)]
pub struct MatchRequest {
	pub method: Method,
	pub path: String,
	pub query: Option<String>,
	/// Value of the `Host` header, if any
	pub host: Option<String>,
	/// The configured `SERVER_NAME`; when set, other hosts do not match
	pub server_name: Option<String>,
}

impl MatchRequest {
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: None,
			host: None,
			server_name: None,
		}
	}

	pub fn with_query(mut self, query: Option<&str>) -> Self {
		self.query = query.map(str::to_string);
		self
	}

	pub fn with_host(mut self, host: Option<&str>) -> Self {
		self.host = host.map(str::to_string);
		self
	}

	pub fn with_server_name(mut self, server_name: Option<&str>) -> Self {
		self.server_name = server_name.map(str::to_string);
		self
	}
}

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
	pub endpoint: String,
	pub params: PathParams,
	/// The rule string that matched
	pub rule: String,
	/// For an `OPTIONS` request answered by the framework: every method the
	/// URL accepts.
	pub automatic_options: Option<Vec<Method>>,
}

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
	Matched(RouteMatch),
	Redirect { location: String, status: StatusCode },
	NotFound,
	MethodNotAllowed { allowed: Vec<Method> },
}

impl Resolution {
	pub fn route(&self) -> Option<&RouteMatch> {
		match self {
			Resolution::Matched(route) => Some(route),
			_ => None,
		}
	}
}

/// A deterministic mapping from requests to endpoints, and back.
pub trait UrlResolver: Send + Sync {
	/// Route one request. Must return the same answer for the same input
	/// and rule set.
	fn resolve(&self, request: &MatchRequest) -> Resolution;

	/// Build the path for an endpoint. Values not consumed by the rule are
	/// appended as a query string.
	///
	/// # Errors
	///
	/// Returns [`BuildError`] if the endpoint is unknown or no rule for it can
	/// be filled with the given values.
	fn build(
		&self,
		endpoint: &str,
		values: &PathParams,
		method: Option<&Method>,
	) -> Result<String, BuildError>;
}
