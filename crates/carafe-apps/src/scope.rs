//! Registration scopes.
//!
//! Hooks and error handlers are registered either for the whole application
//! or for a named blueprint. A request belongs to the blueprints named by the
//! dotted prefix of its endpoint: `admin.users.list` belongs to
//! `admin.users`, then `admin`, then the application.

use std::fmt;

/// Key of a hook list or error handler table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
	App,
	Blueprint(String),
}

impl Scope {
	pub fn blueprint(name: impl Into<String>) -> Self {
		Scope::Blueprint(name.into())
	}

	/// The blueprint name, or `None` for the application scope
	pub fn name(&self) -> Option<&str> {
		match self {
			Scope::App => None,
			Scope::Blueprint(name) => Some(name),
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Scope::App => f.write_str("<app>"),
			Scope::Blueprint(name) => f.write_str(name),
		}
	}
}

/// The blueprint an endpoint belongs to, if any
pub fn endpoint_blueprint(endpoint: &str) -> Option<&str> {
	endpoint.rsplit_once('.').map(|(blueprint, _)| blueprint)
}

/// Scopes active for an endpoint, innermost blueprint first and the
/// application last.
///
/// # Examples
///
/// ```
/// use carafe_apps::scope::{Scope, request_scopes};
///
/// assert_eq!(
///     request_scopes(Some("admin.users.list")),
///     vec![
///         Scope::blueprint("admin.users"),
///         Scope::blueprint("admin"),
///         Scope::App,
///     ]
/// );
/// assert_eq!(request_scopes(None), vec![Scope::App]);
/// ```
pub fn request_scopes(endpoint: Option<&str>) -> Vec<Scope> {
	let mut scopes = Vec::new();
	let mut current = endpoint.and_then(endpoint_blueprint);
	while let Some(blueprint) = current {
		scopes.push(Scope::blueprint(blueprint));
		current = endpoint_blueprint(blueprint);
	}
	scopes.push(Scope::App);
	scopes
}
