//! Hook registries
//!
//! Populated while the application is set up and read-only afterwards. Each
//! hook list is keyed by [`Scope`] and keeps registration order; the
//! dispatcher decides the direction in which a list is walked.

use crate::ctx::RequestContext;
use crate::error_handlers::ErrorHandlers;
use crate::scope::Scope;
use carafe_http::{Error, Response};
use carafe_urls::PathParams;
use indexmap::IndexMap;
use std::sync::Arc;

/// Runs before the view. Returning a response short-circuits the request.
pub type BeforeRequestFn =
	Arc<dyn Fn(&RequestContext) -> Result<Option<Response>, Error> + Send + Sync>;

/// Receives the response and returns the same or a replacement.
pub type AfterRequestFn =
	Arc<dyn Fn(&RequestContext, Response) -> Result<Response, Error> + Send + Sync>;

/// Registered through `after_this_request`; runs once for one request.
pub type AfterThisRequestFn = Box<dyn FnOnce(Response) -> Result<Response, Error> + Send>;

/// Cleanup callback; receives the unhandled fault, if any.
pub type TeardownFn = Arc<dyn Fn(Option<&Error>) -> Result<(), Error> + Send + Sync>;

/// May rewrite the captured path parameters before any before-request hook
/// runs. Receives the endpoint name.
pub type UrlValuePreprocessorFn =
	Arc<dyn Fn(Option<&str>, &mut PathParams) -> Result<(), Error> + Send + Sync>;

/// Fills in values when building a URL for an endpoint.
pub type UrlDefaultsFn = Arc<dyn Fn(&str, &mut PathParams) + Send + Sync>;

/// Runs once, before the first request is dispatched.
pub type BeforeFirstRequestFn = Arc<dyn Fn() -> Result<(), Error> + Send + Sync>;

/// Observer of unhandled faults.
pub type FaultObserverFn = Arc<dyn Fn(&Error, &RequestContext) + Send + Sync>;

/// Ordered hook lists keyed by scope.
#[derive(Clone)]
pub struct ScopedHooks<F> {
	by_scope: IndexMap<Scope, Vec<F>>,
}

impl<F> Default for ScopedHooks<F> {
	fn default() -> Self {
		Self {
			by_scope: IndexMap::new(),
		}
	}
}

impl<F> ScopedHooks<F> {
	pub fn register(&mut self, scope: Scope, hook: F) {
		self.by_scope.entry(scope).or_default().push(hook);
	}

	/// Hooks of one scope in registration order
	pub fn get(&self, scope: &Scope) -> &[F] {
		self.by_scope.get(scope).map(Vec::as_slice).unwrap_or_default()
	}

	/// Total number of hooks across all scopes
	pub fn len(&self) -> usize {
		self.by_scope.values().map(Vec::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Every registration the lifecycle reads while serving.
#[derive(Default)]
pub struct Registry {
	pub before_request: ScopedHooks<BeforeRequestFn>,
	pub after_request: ScopedHooks<AfterRequestFn>,
	pub teardown_request: ScopedHooks<TeardownFn>,
	pub url_value_preprocessors: ScopedHooks<UrlValuePreprocessorFn>,
	pub url_default_functions: ScopedHooks<UrlDefaultsFn>,
	pub error_handlers: ErrorHandlers,
	pub before_first_request: Vec<BeforeFirstRequestFn>,
	pub teardown_appcontext: Vec<TeardownFn>,
	pub fault_observers: Vec<FaultObserverFn>,
}
