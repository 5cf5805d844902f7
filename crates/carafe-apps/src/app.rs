//! The application object
//!
//! An [`Application`] is configured through `&mut self` registration methods
//! and then shared behind an `Arc` to serve requests. Once the first request
//! has been handled the registries are frozen: every registration method
//! returns [`SetupError::AlreadyServing`].

use crate::ctx::{AppContext, RequestContext};
use crate::error::SetupError;
use crate::error_handlers::ErrorHandlerFn;
use crate::registry::Registry;
use crate::scope::{Scope, request_scopes};
use crate::view::View;
use carafe_conf::Config;
use carafe_http::{Error, Extensions, IntoResponse, IntoStatus, Request, Response};
use carafe_urls::{PathParams, Rule, UrlMap, UrlResolver};
use http::Method;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Application {
	import_name: String,
	config: Config,
	url_map: UrlMap,
	view_functions: IndexMap<String, Arc<dyn View>>,
	pub(crate) registry: Registry,
	extensions: Extensions,
	got_first_request: AtomicBool,
	first_request_lock: Mutex<()>,
}

impl fmt::Debug for Application {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Application")
			.field("name", &self.import_name)
			.field("rules", &self.url_map.len())
			.field("got_first_request", &self.got_first_request())
			.finish_non_exhaustive()
	}
}

impl Application {
	/// Create an application with the default configuration
	///
	/// # Examples
	///
	/// ```
	/// use carafe_apps::Application;
	///
	/// let app = Application::new("shop");
	/// assert_eq!(app.name(), "shop");
	/// assert!(!app.config().debug());
	/// ```
	pub fn new(import_name: impl Into<String>) -> Self {
		Self {
			import_name: import_name.into(),
			config: Config::new(),
			url_map: UrlMap::new(),
			view_functions: IndexMap::new(),
			registry: Registry::default(),
			extensions: Extensions::new(),
			got_first_request: AtomicBool::new(false),
			first_request_lock: Mutex::new(()),
		}
	}

	pub fn with_config(mut self, config: Config) -> Self {
		self.config = config;
		self
	}

	pub fn name(&self) -> &str {
		&self.import_name
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn config_mut(&mut self) -> Result<&mut Config, SetupError> {
		self.check_setup("config_mut")?;
		Ok(&mut self.config)
	}

	pub fn url_map(&self) -> &UrlMap {
		&self.url_map
	}

	/// Application-wide extension storage, usable while serving
	pub fn extensions(&self) -> &Extensions {
		&self.extensions
	}

	pub fn view_function(&self, endpoint: &str) -> Option<&Arc<dyn View>> {
		self.view_functions.get(endpoint)
	}

	/// True once the before-first-request hooks have completed
	pub fn got_first_request(&self) -> bool {
		self.got_first_request.load(Ordering::Acquire)
	}

	fn check_setup(&self, method: &'static str) -> Result<(), SetupError> {
		if self.got_first_request() {
			return Err(SetupError::AlreadyServing { method });
		}
		Ok(())
	}

	/// A new application context for this application; not yet pushed
	pub fn app_context(self: &Arc<Self>) -> Arc<AppContext> {
		AppContext::new(self.clone())
	}

	/// A new request context for `request`; not yet pushed
	pub fn request_context(self: &Arc<Self>, request: Request) -> Arc<RequestContext> {
		RequestContext::new(self.clone(), request)
	}

	/// Register a rule and the view serving its endpoint.
	///
	/// # Errors
	///
	/// Returns [`SetupError::DuplicateEndpoint`] if the endpoint already has a
	/// view; use [`Application::add_rule`] to map more URLs to it.
	pub fn add_url_rule<V>(&mut self, rule: Rule, view: V) -> Result<(), SetupError>
	where
		V: View + 'static,
	{
		self.check_setup("add_url_rule")?;
		let endpoint = rule.endpoint().to_string();
		if self.view_functions.contains_key(&endpoint) {
			return Err(SetupError::DuplicateEndpoint(endpoint));
		}
		self.url_map.add(rule);
		self.view_functions.insert(endpoint, Arc::new(view));
		Ok(())
	}

	/// Register a rule for an endpoint whose view is registered separately
	pub fn add_rule(&mut self, rule: Rule) -> Result<(), SetupError> {
		self.check_setup("add_rule")?;
		self.url_map.add(rule);
		Ok(())
	}

	/// Shorthand for a `GET` rule on `pattern`.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_apps::Application;
	/// use carafe_http::Error;
	/// use carafe_urls::PathParams;
	///
	/// let mut app = Application::new("blog");
	/// app.route("/posts/{id:int}", "posts.detail", |params: PathParams| async move {
	///     Ok::<_, Error>(format!("post {}", params.get_int("id").unwrap_or_default()))
	/// })
	/// .unwrap();
	/// assert!(app.url_map().has_endpoint("posts.detail"));
	/// ```
	pub fn route<V>(&mut self, pattern: &str, endpoint: &str, view: V) -> Result<(), SetupError>
	where
		V: View + 'static,
	{
		self.add_url_rule(Rule::new(pattern, endpoint)?, view)
	}

	/// Like [`Application::route`] with an explicit method list
	pub fn route_methods<V, I>(
		&mut self,
		pattern: &str,
		endpoint: &str,
		methods: I,
		view: V,
	) -> Result<(), SetupError>
	where
		V: View + 'static,
		I: IntoIterator<Item = Method>,
	{
		self.add_url_rule(Rule::new(pattern, endpoint)?.methods(methods), view)
	}

	pub fn before_request<F>(&mut self, scope: Scope, f: F) -> Result<(), SetupError>
	where
		F: Fn(&RequestContext) -> Result<Option<Response>, Error> + Send + Sync + 'static,
	{
		self.check_setup("before_request")?;
		self.registry.before_request.register(scope, Arc::new(f));
		Ok(())
	}

	pub fn after_request<F>(&mut self, scope: Scope, f: F) -> Result<(), SetupError>
	where
		F: Fn(&RequestContext, Response) -> Result<Response, Error> + Send + Sync + 'static,
	{
		self.check_setup("after_request")?;
		self.registry.after_request.register(scope, Arc::new(f));
		Ok(())
	}

	pub fn teardown_request<F>(&mut self, scope: Scope, f: F) -> Result<(), SetupError>
	where
		F: Fn(Option<&Error>) -> Result<(), Error> + Send + Sync + 'static,
	{
		self.check_setup("teardown_request")?;
		self.registry.teardown_request.register(scope, Arc::new(f));
		Ok(())
	}

	pub fn url_value_preprocessor<F>(&mut self, scope: Scope, f: F) -> Result<(), SetupError>
	where
		F: Fn(Option<&str>, &mut PathParams) -> Result<(), Error> + Send + Sync + 'static,
	{
		self.check_setup("url_value_preprocessor")?;
		self.registry.url_value_preprocessors.register(scope, Arc::new(f));
		Ok(())
	}

	pub fn url_defaults<F>(&mut self, scope: Scope, f: F) -> Result<(), SetupError>
	where
		F: Fn(&str, &mut PathParams) + Send + Sync + 'static,
	{
		self.check_setup("url_defaults")?;
		self.registry.url_default_functions.register(scope, Arc::new(f));
		Ok(())
	}

	pub fn before_first_request<F>(&mut self, f: F) -> Result<(), SetupError>
	where
		F: Fn() -> Result<(), Error> + Send + Sync + 'static,
	{
		self.check_setup("before_first_request")?;
		self.registry.before_first_request.push(Arc::new(f));
		Ok(())
	}

	/// Runs when an application context is popped for the last time
	pub fn teardown_appcontext<F>(&mut self, f: F) -> Result<(), SetupError>
	where
		F: Fn(Option<&Error>) -> Result<(), Error> + Send + Sync + 'static,
	{
		self.check_setup("teardown_appcontext")?;
		self.registry.teardown_appcontext.push(Arc::new(f));
		Ok(())
	}

	/// Observe every unhandled fault, whether or not it is propagated
	pub fn on_unhandled_fault<F>(&mut self, f: F) -> Result<(), SetupError>
	where
		F: Fn(&Error, &RequestContext) + Send + Sync + 'static,
	{
		self.check_setup("on_unhandled_fault")?;
		self.registry.fault_observers.push(Arc::new(f));
		Ok(())
	}

	/// Handle faults carrying `status`.
	///
	/// # Errors
	///
	/// Returns [`SetupError::InvalidErrorCode`] unless `status` is a 4xx or
	/// 5xx code.
	pub fn register_error_handler<S, F, R>(
		&mut self,
		scope: Scope,
		status: S,
		f: F,
	) -> Result<(), SetupError>
	where
		S: IntoStatus,
		F: Fn(&Error) -> Result<R, Error> + Send + Sync + 'static,
		R: IntoResponse,
	{
		self.check_setup("register_error_handler")?;
		let status = status.into_status()?;
		if !status.is_client_error() && !status.is_server_error() {
			return Err(SetupError::InvalidErrorCode(status.as_u16()));
		}
		self.registry
			.error_handlers
			.register_status(scope, status, wrap_handler(f));
		Ok(())
	}

	/// Handle faults whose underlying error is an `E`. The handler receives
	/// the concrete error.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_apps::{Application, Scope};
	/// use carafe_http::Error;
	///
	/// let mut app = Application::new("api");
	/// app.register_error_handler_for::<std::io::Error, _, _>(Scope::App, |err| {
	///     Ok::<_, Error>((format!("io: {err}"), 503))
	/// })
	/// .unwrap();
	/// ```
	pub fn register_error_handler_for<E, F, R>(&mut self, scope: Scope, f: F) -> Result<(), SetupError>
	where
		E: StdError + 'static,
		F: Fn(&E) -> Result<R, Error> + Send + Sync + 'static,
		R: IntoResponse,
	{
		self.check_setup("register_error_handler_for")?;
		let handler = wrap_handler(move |err: &Error| match err.downcast_ref::<E>() {
			Some(concrete) => f(concrete),
			None => Err(Error::handler(format!(
				"error handler for {} invoked with another error",
				std::any::type_name::<E>()
			))),
		});
		self.registry.error_handlers.register_type::<E>(scope, handler);
		Ok(())
	}

	/// Handle every fault not claimed by a more specific handler of the same
	/// scope, HTTP errors included
	pub fn register_catch_all_handler<F, R>(&mut self, scope: Scope, f: F) -> Result<(), SetupError>
	where
		F: Fn(&Error) -> Result<R, Error> + Send + Sync + 'static,
		R: IntoResponse,
	{
		self.check_setup("register_catch_all_handler")?;
		self.registry
			.error_handlers
			.register_catch_all(scope, wrap_handler(f));
		Ok(())
	}

	/// Run the before-first-request hooks once for the application's lifetime.
	///
	/// The latch is checked before taking the lock and again after, so
	/// steady-state requests never lock and concurrent first requests wait
	/// for the one running the hooks. A failing hook leaves the latch unset.
	pub(crate) fn try_trigger_before_first_request(&self) -> Result<(), Error> {
		if self.got_first_request.load(Ordering::Acquire) {
			return Ok(());
		}
		let _guard = self.first_request_lock.lock();
		if self.got_first_request.load(Ordering::Acquire) {
			return Ok(());
		}
		tracing::debug!(
			app = %self.import_name,
			hooks = self.registry.before_first_request.len(),
			"running before-first-request hooks"
		);
		for hook in &self.registry.before_first_request {
			hook()?;
		}
		self.got_first_request.store(true, Ordering::Release);
		Ok(())
	}

	/// Run teardown-request hooks: innermost scope first, each list in
	/// reverse registration order. Failures are logged and do not stop the
	/// remaining hooks.
	pub(crate) fn do_teardown_request(&self, ctx: &RequestContext, fault: Option<&Error>) {
		for scope in ctx.scopes() {
			for hook in self.registry.teardown_request.get(&scope).iter().rev() {
				if let Err(err) = hook(fault) {
					tracing::warn!(scope = %scope, error = %err, "teardown_request hook failed");
				}
			}
		}
	}

	/// Run teardown-appcontext hooks in reverse registration order
	pub(crate) fn do_teardown_appcontext(&self, fault: Option<&Error>) {
		for hook in self.registry.teardown_appcontext.iter().rev() {
			if let Err(err) = hook(fault) {
				tracing::warn!(error = %err, "teardown_appcontext hook failed");
			}
		}
	}

	/// Apply the url-defaults of `endpoint`'s scopes: the application first,
	/// then blueprints outermost to innermost.
	pub(crate) fn inject_url_defaults(&self, endpoint: &str, values: &mut PathParams) {
		let scopes = request_scopes(Some(endpoint));
		for scope in scopes.iter().rev() {
			for hook in self.registry.url_default_functions.get(scope) {
				hook(endpoint, values);
			}
		}
	}

	/// Build the URL of `endpoint`.
	///
	/// An endpoint starting with `.` is relative to `current_blueprint`.
	///
	/// # Errors
	///
	/// Returns the [`carafe_urls::BuildError`] as a handler fault.
	pub fn build_url(
		&self,
		endpoint: &str,
		mut values: PathParams,
		current_blueprint: Option<&str>,
	) -> Result<String, Error> {
		let endpoint = match endpoint.strip_prefix('.') {
			Some(local) => match current_blueprint {
				Some(blueprint) => format!("{blueprint}.{local}"),
				None => local.to_string(),
			},
			None => endpoint.to_string(),
		};
		self.inject_url_defaults(&endpoint, &mut values);
		self.url_map
			.build(&endpoint, &values, None)
			.map_err(Error::handler)
	}
}

/// Convert a handler's return value through the canonical response
/// conversion.
fn wrap_handler<F, R>(f: F) -> ErrorHandlerFn
where
	F: Fn(&Error) -> Result<R, Error> + Send + Sync + 'static,
	R: IntoResponse,
{
	Arc::new(move |err: &Error| -> Result<Response, Error> {
		Ok(f(err)?.into_response()?)
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	async fn index(_params: PathParams) -> Result<&'static str, Error> {
		Ok("index")
	}

	#[rstest]
	fn test_duplicate_endpoint_is_rejected() {
		let mut app = Application::new("test");
		app.route("/", "index", index).unwrap();

		let err = app.route("/home", "index", index).unwrap_err();
		assert!(matches!(err, SetupError::DuplicateEndpoint(endpoint) if endpoint == "index"));

		app.add_rule(Rule::new("/home", "index").unwrap()).unwrap();
		assert_eq!(app.url_map().rules_for("index").count(), 2);
	}

	#[rstest]
	fn test_registration_rejected_after_first_request() {
		let mut app = Application::new("test");
		app.try_trigger_before_first_request().unwrap();

		let err = app.before_request(Scope::App, |_| Ok(None)).unwrap_err();
		assert!(matches!(
			err,
			SetupError::AlreadyServing {
				method: "before_request"
			}
		));
		assert!(app.config_mut().is_err());
	}

	#[rstest]
	#[case(200)]
	#[case(302)]
	fn test_error_handler_requires_error_status(#[case] status: i32) {
		let mut app = Application::new("test");
		let err = app
			.register_error_handler(Scope::App, status, |_| Ok::<_, Error>("x"))
			.unwrap_err();
		assert!(matches!(err, SetupError::InvalidErrorCode(_)));
	}

	#[rstest]
	fn test_failed_first_request_hook_leaves_latch_unset() {
		let mut app = Application::new("test");
		app.before_first_request(|| Err(Error::handler("not ready")))
			.unwrap();

		assert!(app.try_trigger_before_first_request().is_err());
		assert!(!app.got_first_request());
	}

	#[rstest]
	fn test_build_url_relative_and_defaults() {
		let mut app = Application::new("test");
		app.route("/{lang}/shop/{item}", "shop.item", index).unwrap();
		app.url_defaults(Scope::blueprint("shop"), |_, values| {
			values.set_default("lang", "en");
		})
		.unwrap();

		let values: PathParams = [("item", "tea")].into_iter().collect();
		let url = app.build_url(".item", values, Some("shop")).unwrap();

		assert_eq!(url, "/en/shop/tea");
	}
}
