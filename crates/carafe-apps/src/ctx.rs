//! Application and request contexts
//!
//! An [`AppContext`] binds "the current application" and is reference
//! counted explicitly: it sits on the context stack from the push that takes
//! its count from 0 to 1 until the pop that brings it back to 0, and its
//! teardown hooks fire at exactly that pop.
//!
//! A [`RequestContext`] binds one inbound request and its routing outcome.
//! Pushing it pushes (creating if needed) the application context beneath
//! it; popping it runs the teardown hooks and releases that application
//! context again.

use crate::app::Application;
use crate::registry::AfterThisRequestFn;
use crate::scope::{Scope, endpoint_blueprint, request_scopes};
use crate::stack::{self, Frame};
use crate::streaming::StreamState;
use carafe_http::{ContractViolation, Error, Extensions, Request, Response};
use carafe_urls::{MatchRequest, PathParams, Resolution, RouteMatch, UrlResolver};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Application-scoped state for one unit of work.
pub struct AppContext {
	app: Arc<Application>,
	g: Extensions,
	refs: Mutex<usize>,
	entry_fault: Mutex<Option<Error>>,
}

impl AppContext {
	pub fn new(app: Arc<Application>) -> Arc<Self> {
		Arc::new(Self {
			app,
			g: Extensions::new(),
			refs: Mutex::new(0),
			entry_fault: Mutex::new(None),
		})
	}

	pub fn app(&self) -> &Arc<Application> {
		&self.app
	}

	/// Storage living as long as this context
	pub fn g(&self) -> &Extensions {
		&self.g
	}

	/// Number of outstanding pushes
	pub fn ref_count(&self) -> usize {
		*self.refs.lock()
	}

	/// Push this context, or take another reference if it is already pushed.
	///
	/// The first push of any application context of an application runs the
	/// before-first-request hooks. A failure there does not fail the push;
	/// it is kept for the request that triggered it (see
	/// [`AppContext::take_entry_fault`]).
	pub fn push(self: &Arc<Self>) -> Result<(), ContractViolation> {
		{
			let mut refs = self.refs.lock();
			if *refs == 0 {
				stack::push(Frame::App(self.clone()))?;
			}
			*refs += 1;
		}

		if let Err(err) = self.app.try_trigger_before_first_request() {
			tracing::error!(app = %self.app.name(), error = %err, "before-first-request hook failed");
			*self.entry_fault.lock() = Some(err);
		}
		Ok(())
	}

	/// The fault raised by the before-first-request hooks during the last
	/// push, if any
	pub fn take_entry_fault(&self) -> Option<Error> {
		self.entry_fault.lock().take()
	}

	/// Release one reference. The last release runs the teardown-appcontext
	/// hooks, passing `fault` through, and removes the context from the
	/// stack.
	pub fn pop(self: &Arc<Self>, fault: Option<&Error>) -> Result<(), ContractViolation> {
		let remaining = {
			let mut refs = self.refs.lock();
			if *refs == 0 {
				return Err(ContractViolation::UnbalancedPop(self.describe()));
			}
			*refs -= 1;
			*refs
		};
		if remaining > 0 {
			return Ok(());
		}

		self.app.do_teardown_appcontext(fault);
		stack::pop(&Frame::App(self.clone())).map(drop)
	}

	fn describe(&self) -> String {
		format!("application context of {:?}", self.app.name())
	}
}

impl fmt::Debug for AppContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AppContext")
			.field("app", &self.app.name())
			.field("refs", &self.ref_count())
			.finish()
	}
}

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Created,
	Routing,
	Preprocessing,
	Dispatching,
	ResponseReady,
	Finalizing,
	TearingDown,
	TornDown,
}

/// Request-scoped state for one inbound request.
pub struct RequestContext {
	app: Arc<Application>,
	request: Request,
	app_ctx: OnceLock<(Arc<AppContext>, bool)>,
	resolution: OnceLock<Resolution>,
	view_args: Mutex<PathParams>,
	session: Extensions,
	deferred_fault: Mutex<Option<Error>>,
	stage: Mutex<Stage>,
	after_this_request: Mutex<Vec<AfterThisRequestFn>>,
	pushed: AtomicBool,
	popped: AtomicBool,
	app_released: AtomicBool,
	pub(crate) streaming: Mutex<StreamState>,
}

impl RequestContext {
	pub fn new(app: Arc<Application>, request: Request) -> Arc<Self> {
		Arc::new(Self {
			app,
			request,
			app_ctx: OnceLock::new(),
			resolution: OnceLock::new(),
			view_args: Mutex::new(PathParams::new()),
			session: Extensions::new(),
			deferred_fault: Mutex::new(None),
			stage: Mutex::new(Stage::Created),
			after_this_request: Mutex::new(Vec::new()),
			pushed: AtomicBool::new(false),
			popped: AtomicBool::new(false),
			app_released: AtomicBool::new(false),
			streaming: Mutex::new(StreamState::default()),
		})
	}

	/// Push the application context (reusing the current one if it belongs
	/// to the same application), push this context on top of it and resolve
	/// the route.
	///
	/// Routing failures are stored, not raised; they surface when the
	/// request is dispatched.
	pub fn push(self: &Arc<Self>) -> Result<(), ContractViolation> {
		if self.pushed.swap(true, Ordering::AcqRel) {
			return Err(ContractViolation::AlreadyPushed(self.describe()));
		}

		let (app_ctx, created) = match stack::top_app() {
			Some(current) if Arc::ptr_eq(current.app(), &self.app) => (current, false),
			_ => (self.app.app_context(), true),
		};
		if let Err(violation) = app_ctx.push() {
			self.pushed.store(false, Ordering::Release);
			return Err(violation);
		}
		if let Some(fault) = app_ctx.take_entry_fault() {
			*self.deferred_fault.lock() = Some(fault);
		}
		let _ = self.app_ctx.set((app_ctx.clone(), created));

		if let Err(violation) = stack::push(Frame::Request(self.clone())) {
			if let Err(pop_violation) = app_ctx.pop(None) {
				tracing::error!(error = %pop_violation, "failed to release application context");
			}
			return Err(violation);
		}

		self.resolve();
		Ok(())
	}

	fn resolve(&self) {
		self.set_stage(Stage::Routing);
		let request = &self.request;
		let match_request = MatchRequest::new(request.method.clone(), request.path())
			.with_query(request.query())
			.with_host(request.host())
			.with_server_name(self.app.config().server_name());
		let resolution = self.app.url_map().resolve(&match_request);
		tracing::debug!(
			method = %request.method,
			path = %request.path(),
			resolution = ?resolution,
			"resolved request"
		);
		if let Some(route) = resolution.route() {
			*self.view_args.lock() = route.params.clone();
		}
		let _ = self.resolution.set(resolution);
	}

	/// Run the teardown-request hooks, then remove this context and release
	/// its application context.
	///
	/// Runs at most once. Both pops are attempted even if the first one
	/// finds the stack out of order; the first violation is returned.
	pub fn pop(self: &Arc<Self>, fault: Option<&Error>) -> Result<(), ContractViolation> {
		if !self.pushed.load(Ordering::Acquire) || self.popped.swap(true, Ordering::AcqRel) {
			return Err(ContractViolation::UnbalancedPop(self.describe()));
		}

		self.set_stage(Stage::TearingDown);
		self.app.do_teardown_request(self, fault);

		let request_popped = stack::pop(&Frame::Request(self.clone())).map(drop);
		let app_popped = match self.app_ctx.get() {
			Some((app_ctx, _)) if !self.app_released.swap(true, Ordering::AcqRel) => {
				app_ctx.pop(fault)
			}
			_ => Ok(()),
		};
		self.set_stage(Stage::TornDown);
		request_popped.and(app_popped)
	}

	/// Give back this request's reference on an application context it
	/// reused, ahead of its own pop. Must run on the stack holding the
	/// application frame.
	pub(crate) fn release_app_context(&self) -> Result<(), ContractViolation> {
		match self.app_ctx.get() {
			Some((app_ctx, _)) if !self.app_released.swap(true, Ordering::AcqRel) => {
				app_ctx.pop(None)
			}
			_ => Ok(()),
		}
	}

	pub fn app(&self) -> &Arc<Application> {
		&self.app
	}

	pub fn request(&self) -> &Request {
		&self.request
	}

	/// The application context this request runs in; set once pushed
	pub fn app_context(&self) -> Option<&Arc<AppContext>> {
		self.app_ctx.get().map(|(ctx, _)| ctx)
	}

	/// Whether pushing this request created its application context
	pub fn created_app_context(&self) -> bool {
		self.app_ctx.get().is_some_and(|(_, created)| *created)
	}

	/// The routing outcome; set once pushed
	pub fn resolution(&self) -> Option<&Resolution> {
		self.resolution.get()
	}

	pub fn route(&self) -> Option<&RouteMatch> {
		self.resolution().and_then(Resolution::route)
	}

	pub fn endpoint(&self) -> Option<&str> {
		self.route().map(|route| route.endpoint.as_str())
	}

	pub fn blueprint(&self) -> Option<&str> {
		self.endpoint().and_then(endpoint_blueprint)
	}

	/// Scopes whose hooks apply to this request, innermost first
	pub fn scopes(&self) -> Vec<Scope> {
		request_scopes(self.endpoint())
	}

	/// The path parameters the view will receive
	pub fn view_args(&self) -> PathParams {
		self.view_args.lock().clone()
	}

	pub fn set_view_args(&self, params: PathParams) {
		*self.view_args.lock() = params;
	}

	/// Request-scoped session storage
	pub fn session(&self) -> &Extensions {
		&self.session
	}

	pub fn stage(&self) -> Stage {
		*self.stage.lock()
	}

	pub(crate) fn set_stage(&self, stage: Stage) {
		tracing::trace!(?stage, "request stage");
		*self.stage.lock() = stage;
	}

	pub fn is_popped(&self) -> bool {
		self.popped.load(Ordering::Acquire)
	}

	/// Run `f` on the response of this request only, before the
	/// after-request hooks
	pub fn after_this_request<F>(&self, f: F)
	where
		F: FnOnce(Response) -> Result<Response, Error> + Send + 'static,
	{
		self.after_this_request.lock().push(Box::new(f));
	}

	pub(crate) fn take_after_this_request(&self) -> Vec<AfterThisRequestFn> {
		std::mem::take(&mut *self.after_this_request.lock())
	}

	pub(crate) fn take_deferred_fault(&self) -> Option<Error> {
		self.deferred_fault.lock().take()
	}

	fn describe(&self) -> String {
		format!(
			"request context for {} {}",
			self.request.method,
			self.request.path()
		)
	}
}

impl fmt::Debug for RequestContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RequestContext")
			.field("method", &self.request.method)
			.field("path", &self.request.path())
			.field("endpoint", &self.endpoint())
			.field("stage", &self.stage())
			.finish_non_exhaustive()
	}
}
