//! Error handler tables and lookup.
//!
//! Handlers are keyed by scope and by either an HTTP status or an error
//! type. Lookup for a fault raised while serving an endpoint:
//!
//! 1. If the fault carries a status, status-keyed handlers, innermost scope
//!    first.
//! 2. Type-keyed handlers, innermost scope first. Within one scope the exact
//!    type is tried before the catch-all registered for [`carafe_http::Error`]
//!    itself.
//!
//! Contract violations are never offered to handlers.

use crate::scope::Scope;
use carafe_http::{Error, Response, StatusCode};
use indexmap::IndexMap;
use std::any::TypeId;
use std::error::Error as StdError;
use std::sync::Arc;

/// Converts a fault into a response, or fails with a new fault.
pub type ErrorHandlerFn = Arc<dyn Fn(&Error) -> Result<Response, Error> + Send + Sync>;

struct TypedHandler {
	type_id: TypeId,
	matches: fn(&Error) -> bool,
	handler: ErrorHandlerFn,
}

fn is_type<E: StdError + 'static>(err: &Error) -> bool {
	err.is::<E>()
}

#[derive(Default)]
struct ScopeTable {
	by_status: IndexMap<StatusCode, ErrorHandlerFn>,
	by_type: Vec<TypedHandler>,
	catch_all: Option<ErrorHandlerFn>,
}

/// Error handlers of every scope.
#[derive(Default)]
pub struct ErrorHandlers {
	tables: IndexMap<Scope, ScopeTable>,
}

impl ErrorHandlers {
	/// Register a handler for an HTTP status; replaces an existing one
	pub fn register_status(&mut self, scope: Scope, status: StatusCode, handler: ErrorHandlerFn) {
		self.tables
			.entry(scope)
			.or_default()
			.by_status
			.insert(status, handler);
	}

	/// Register a handler for faults whose underlying error is an `E`;
	/// replaces an existing one for the same type
	pub fn register_type<E>(&mut self, scope: Scope, handler: ErrorHandlerFn)
	where
		E: StdError + 'static,
	{
		let table = self.tables.entry(scope).or_default();
		let type_id = TypeId::of::<E>();
		let entry = TypedHandler {
			type_id,
			matches: is_type::<E>,
			handler,
		};
		match table.by_type.iter_mut().find(|existing| existing.type_id == type_id) {
			Some(existing) => *existing = entry,
			None => table.by_type.push(entry),
		}
	}

	/// Register the catch-all handler of a scope
	pub fn register_catch_all(&mut self, scope: Scope, handler: ErrorHandlerFn) {
		self.tables.entry(scope).or_default().catch_all = Some(handler);
	}

	/// Find the most specific handler for `err` across `scopes`, which are
	/// ordered innermost first.
	pub fn find(&self, err: &Error, scopes: &[Scope]) -> Option<ErrorHandlerFn> {
		if err.is_contract_violation() {
			return None;
		}

		if let Some(status) = err.status() {
			let by_status = scopes
				.iter()
				.filter_map(|scope| self.tables.get(scope))
				.find_map(|table| table.by_status.get(&status));
			if let Some(handler) = by_status {
				return Some(handler.clone());
			}
		}

		scopes
			.iter()
			.filter_map(|scope| self.tables.get(scope))
			.find_map(|table| {
				table
					.by_type
					.iter()
					.find(|typed| (typed.matches)(err))
					.map(|typed| &typed.handler)
					.or(table.catch_all.as_ref())
			})
			.cloned()
	}

	pub fn is_empty(&self) -> bool {
		self.tables.values().all(|table| {
			table.by_status.is_empty() && table.by_type.is_empty() && table.catch_all.is_none()
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use carafe_http::{ContractViolation, HttpError};
	use rstest::rstest;
	use std::fmt;

	#[derive(Debug)]
	struct ValueErrorLike;

	impl fmt::Display for ValueErrorLike {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			f.write_str("value error")
		}
	}

	impl StdError for ValueErrorLike {}

	fn tagged(tag: &'static str) -> ErrorHandlerFn {
		Arc::new(move |_: &Error| -> Result<Response, Error> {
			Ok(Response::ok().with_body(tag))
		})
	}

	fn tag_of(handler: Option<ErrorHandlerFn>, err: &Error) -> Option<String> {
		let response = handler?(err).ok()?;
		let body = response.body.as_bytes()?.clone();
		Some(String::from_utf8(body.to_vec()).ok()?)
	}

	fn scopes() -> Vec<Scope> {
		vec![Scope::blueprint("shop"), Scope::App]
	}

	#[rstest]
	fn test_blueprint_type_handler_beats_app() {
		let mut handlers = ErrorHandlers::default();
		handlers.register_type::<ValueErrorLike>(Scope::App, tagged("app"));
		handlers.register_type::<ValueErrorLike>(Scope::blueprint("shop"), tagged("shop"));
		let err = Error::handler(ValueErrorLike);

		assert_eq!(tag_of(handlers.find(&err, &scopes()), &err).as_deref(), Some("shop"));
		assert_eq!(
			tag_of(handlers.find(&err, &[Scope::App]), &err).as_deref(),
			Some("app")
		);
	}

	#[rstest]
	fn test_exact_type_before_catch_all_in_same_scope() {
		let mut handlers = ErrorHandlers::default();
		handlers.register_catch_all(Scope::App, tagged("any"));
		handlers.register_type::<ValueErrorLike>(Scope::App, tagged("typed"));

		let typed = Error::handler(ValueErrorLike);
		let other = Error::handler(std::io::Error::other("io"));

		assert_eq!(tag_of(handlers.find(&typed, &scopes()), &typed).as_deref(), Some("typed"));
		assert_eq!(tag_of(handlers.find(&other, &scopes()), &other).as_deref(), Some("any"));
	}

	#[rstest]
	fn test_status_handlers_are_tried_first() {
		let mut handlers = ErrorHandlers::default();
		handlers.register_type::<HttpError>(Scope::blueprint("shop"), tagged("http-type"));
		handlers.register_status(Scope::App, StatusCode::NOT_FOUND, tagged("404"));
		let err = Error::from(HttpError::not_found());

		assert_eq!(tag_of(handlers.find(&err, &scopes()), &err).as_deref(), Some("404"));

		let forbidden = Error::from(HttpError::from_status(StatusCode::FORBIDDEN));
		assert_eq!(
			tag_of(handlers.find(&forbidden, &scopes()), &forbidden).as_deref(),
			Some("http-type")
		);
	}

	#[rstest]
	fn test_contract_violations_are_never_handled() {
		let mut handlers = ErrorHandlers::default();
		handlers.register_catch_all(Scope::App, tagged("any"));
		let err = Error::from(ContractViolation::NoActiveScope);

		assert!(handlers.find(&err, &scopes()).is_none());
	}
}
