use crate::error::BuildError;
use crate::params::PathParams;
use crate::resolution::{MatchRequest, Resolution, RouteMatch, UrlResolver};
use crate::rule::Rule;
use http::{Method, StatusCode};
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

const QUERY: &AsciiSet = &CONTROLS
	.add(b' ')
	.add(b'"')
	.add(b'#')
	.add(b'%')
	.add(b'&')
	.add(b'+')
	.add(b'<')
	.add(b'=')
	.add(b'>');

/// Ordered collection of [`Rule`]s.
///
/// Rules are tried in registration order; the first rule whose pattern and
/// method both match wins.
#[derive(Debug, Clone, Default)]
pub struct UrlMap {
	rules: Vec<Rule>,
	by_endpoint: IndexMap<String, Vec<usize>>,
}

impl UrlMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, rule: Rule) {
		self.by_endpoint
			.entry(rule.endpoint().to_string())
			.or_default()
			.push(self.rules.len());
		self.rules.push(rule);
	}

	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}

	/// Rules registered for an endpoint, in registration order
	pub fn rules_for<'a>(&'a self, endpoint: &str) -> impl Iterator<Item = &'a Rule> + 'a {
		self.by_endpoint
			.get(endpoint)
			.into_iter()
			.flatten()
			.filter_map(|&index| self.rules.get(index))
	}

	pub fn has_endpoint(&self, endpoint: &str) -> bool {
		self.by_endpoint.contains_key(endpoint)
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// Every method accepted by any rule matching `path`
	pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
		let mut allowed = Vec::new();
		for rule in &self.rules {
			if rule.pattern().matches(path).is_some() {
				for method in rule.allowed_methods() {
					if !allowed.contains(&method) {
						allowed.push(method);
					}
				}
			}
		}
		allowed
	}

	fn host_matches(request: &MatchRequest) -> bool {
		match (&request.server_name, &request.host) {
			(Some(server_name), Some(host)) => host.eq_ignore_ascii_case(server_name),
			_ => true,
		}
	}
}

impl UrlResolver for UrlMap {
	fn resolve(&self, request: &MatchRequest) -> Resolution {
		if !Self::host_matches(request) {
			return Resolution::NotFound;
		}

		let mut allowed: Vec<Method> = Vec::new();
		let mut redirect = None;
		for rule in &self.rules {
			match rule.pattern().matches(&request.path) {
				Some(params) if rule.accepts(&request.method) => {
					let automatic_options = (request.method == Method::OPTIONS
						&& rule.provides_automatic_options())
					.then(|| self.allowed_methods(&request.path));
					return Resolution::Matched(RouteMatch {
						endpoint: rule.endpoint().to_string(),
						params,
						rule: rule.rule().to_string(),
						automatic_options,
					});
				}
				Some(_) => {
					for method in rule.allowed_methods() {
						if !allowed.contains(&method) {
							allowed.push(method);
						}
					}
				}
				None => {
					if redirect.is_none()
						&& rule.is_strict_slashes()
						&& rule.rule().ends_with('/')
						&& !request.path.ends_with('/')
						&& rule.accepts(&request.method)
					{
						let canonical = format!("{}/", request.path);
						if rule.pattern().matches(&canonical).is_some() {
							redirect = Some(canonical);
						}
					}
				}
			}
		}

		if let Some(mut location) = redirect {
			if let Some(query) = request.query.as_deref().filter(|query| !query.is_empty()) {
				location.push('?');
				location.push_str(query);
			}
			return Resolution::Redirect {
				location,
				status: StatusCode::PERMANENT_REDIRECT,
			};
		}
		if !allowed.is_empty() {
			return Resolution::MethodNotAllowed { allowed };
		}
		Resolution::NotFound
	}

	fn build(
		&self,
		endpoint: &str,
		values: &PathParams,
		method: Option<&Method>,
	) -> Result<String, BuildError> {
		if !self.has_endpoint(endpoint) {
			return Err(BuildError::UnknownEndpoint(endpoint.to_string()));
		}

		let mut last_error = None;
		for rule in self.rules_for(endpoint) {
			if let Some(method) = method
				&& !rule.accepts(method)
			{
				last_error.get_or_insert_with(|| BuildError::MethodMismatch {
					endpoint: endpoint.to_string(),
					method: method.to_string(),
				});
				continue;
			}
			match rule.pattern().build(endpoint, values) {
				Ok((mut path, used)) => {
					let query: Vec<String> = values
						.iter()
						.filter(|(name, _)| !used.iter().any(|used| used.as_str() == *name))
						.map(|(name, value)| {
							format!(
								"{}={}",
								utf8_percent_encode(name, QUERY),
								utf8_percent_encode(&value.to_string(), QUERY)
							)
						})
						.collect();
					if !query.is_empty() {
						path.push('?');
						path.push_str(&query.join("&"));
					}
					return Ok(path);
				}
				Err(err) => last_error = Some(err),
			}
		}
		Err(last_error.unwrap_or_else(|| BuildError::UnknownEndpoint(endpoint.to_string())))
	}
}
