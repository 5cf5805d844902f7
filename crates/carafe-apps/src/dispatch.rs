//! The request lifecycle.
//!
//! [`Application::handle`] drives one request through
//! `Routing -> Preprocessing -> Dispatching -> ResponseReady -> Finalizing ->
//! TornDown`. Every exit path, including an unhandled fault and the
//! cancellation of the `handle` future, ends in exactly one pop of the
//! request context. The only exception is a response whose body was wrapped
//! with [`stream_with_context`](crate::globals::stream_with_context): its
//! teardown is deferred until the body is consumed or dropped.
//!
//! ## Fault handling
//!
//! - A fault from preprocessing or the view is offered to the registered
//!   error handlers. HTTP errors without a handler render their default
//!   response unless `TRAP_HTTP_EXCEPTIONS` is set.
//! - A fault nobody handles is reported to the fault observers. It is then
//!   either returned to the caller (`PROPAGATE_EXCEPTIONS`) or rendered as a
//!   500, and the teardown hooks receive it.
//! - Contract violations skip the handlers and are always returned.

use crate::app::Application;
use crate::ctx::{RequestContext, Stage};
use crate::stack::{self, ContextStack, Frame};
use crate::streaming;
use carafe_http::{ContractViolation, Error, HeaderValue, HttpError, Method, Request, Response};
use carafe_urls::Resolution;
use http::header;
use std::sync::Arc;
use tracing::Instrument;

impl Application {
	/// Handle one request from routing to teardown.
	///
	/// Runs inside the task's context stack if one is active, otherwise in a
	/// new one.
	///
	/// # Errors
	///
	/// Returns contract violations, and any unhandled fault when
	/// `PROPAGATE_EXCEPTIONS` is in effect.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_apps::Application;
	/// use carafe_http::{Error, Request, StatusCode};
	/// use carafe_urls::PathParams;
	/// use std::sync::Arc;
	///
	/// # tokio_test::block_on(async {
	/// let mut app = Application::new("hello");
	/// app.route("/", "index", |_params: PathParams| async { Ok::<_, Error>("hello") })
	///     .unwrap();
	/// let app = Arc::new(app);
	///
	/// let response = app.handle(Request::builder().uri("/").build().unwrap()).await.unwrap();
	/// assert_eq!(response.status, StatusCode::OK);
	///
	/// let missing = app.handle(Request::builder().uri("/missing").build().unwrap()).await.unwrap();
	/// assert_eq!(missing.status, StatusCode::NOT_FOUND);
	/// # });
	/// ```
	pub async fn handle(self: &Arc<Self>, request: Request) -> Result<Response, Error> {
		stack::ensure_scope(self.handle_in_scope(request)).await
	}

	async fn handle_in_scope(self: &Arc<Self>, request: Request) -> Result<Response, Error> {
		let span = tracing::info_span!("request", method = %request.method, path = %request.path());
		let ctx = self.request_context(request);
		ctx.push()?;
		let mut guard = TeardownGuard::new(ctx.clone());

		let outcome = self
			.full_dispatch_request(&ctx)
			.instrument(span.clone())
			.await;
		guard.disarm();

		span.in_scope(|| self.complete_request(&ctx, outcome))
	}

	fn complete_request(
		&self,
		ctx: &Arc<RequestContext>,
		outcome: Result<Response, Error>,
	) -> Result<Response, Error> {
		match outcome {
			Ok(response) => {
				match streaming::detach(ctx) {
					Ok(true) => {
						tracing::debug!("teardown deferred until the body is consumed");
						return Ok(response);
					}
					Ok(false) => {}
					Err(violation) => {
						tracing::error!(error = %violation, "failed to detach streamed request");
					}
				}
				teardown(ctx, None)?;
				Ok(response)
			}
			Err(fault) => {
				let (response, fault) = self.handle_exception(ctx, fault);
				match response {
					Some(response) => {
						teardown(ctx, Some(&fault))?;
						Ok(response)
					}
					None => {
						// the original fault wins over a violation found while popping
						let _ = teardown(ctx, Some(&fault));
						Err(fault)
					}
				}
			}
		}
	}

	/// Preprocess, dispatch and finalize, routing faults through the
	/// registered error handlers.
	async fn full_dispatch_request(&self, ctx: &RequestContext) -> Result<Response, Error> {
		let response = match self.preprocess_and_dispatch(ctx).await {
			Ok(response) => response,
			Err(err) => self.handle_user_exception(ctx, err)?,
		};
		self.finalize_request(ctx, response, false)
	}

	async fn preprocess_and_dispatch(&self, ctx: &RequestContext) -> Result<Response, Error> {
		if let Some(fault) = ctx.take_deferred_fault() {
			return Err(fault);
		}

		let route = match ctx.resolution() {
			Some(Resolution::Matched(route)) => route,
			Some(Resolution::Redirect { location, status }) => {
				return Ok(HttpError::redirect(location.clone(), *status).to_response());
			}
			Some(Resolution::MethodNotAllowed { allowed }) => {
				return Err(HttpError::method_not_allowed(allowed.clone()).into());
			}
			Some(Resolution::NotFound) | None => return Err(HttpError::not_found().into()),
		};

		ctx.set_stage(Stage::Preprocessing);
		// application first, then blueprints outermost to innermost
		let scopes = ctx.scopes();
		let mut view_args = ctx.view_args();
		for scope in scopes.iter().rev() {
			for preprocessor in self.registry.url_value_preprocessors.get(scope) {
				preprocessor(Some(route.endpoint.as_str()), &mut view_args)?;
			}
		}
		ctx.set_view_args(view_args);

		for scope in scopes.iter().rev() {
			for hook in self.registry.before_request.get(scope) {
				if let Some(response) = hook(ctx)? {
					tracing::debug!(scope = %scope, "before_request hook returned a response");
					return Ok(response);
				}
			}
		}

		ctx.set_stage(Stage::Dispatching);
		if let Some(allowed) = &route.automatic_options {
			return Ok(options_response(allowed));
		}
		let view = self
			.view_function(&route.endpoint)
			.cloned()
			.ok_or_else(|| ContractViolation::MissingView(route.endpoint.clone()))?;
		view.call(ctx.view_args()).await
	}

	/// Convert a fault raised by preprocessing or the view into a response,
	/// or hand it back if no handler claims it.
	fn handle_user_exception(&self, ctx: &RequestContext, err: Error) -> Result<Response, Error> {
		if err.is_contract_violation() {
			return Err(err);
		}

		if let Some(http) = err.as_http()
			&& !self.config().trap_http_exceptions()
		{
			if http.is_redirect() {
				return Ok(http.to_response());
			}
			return match self.registry.error_handlers.find(&err, &ctx.scopes()) {
				Some(handler) => handler(&err),
				None => Ok(http.to_response()),
			};
		}

		match self.registry.error_handlers.find(&err, &ctx.scopes()) {
			Some(handler) => {
				tracing::debug!(error = %err, "fault handled by a registered error handler");
				handler(&err)
			}
			None => Err(err),
		}
	}

	/// Deal with a fault no error handler claimed.
	///
	/// Returns the response to send, if any, together with the fault, which
	/// teardown receives either way.
	fn handle_exception(&self, ctx: &RequestContext, err: Error) -> (Option<Response>, Error) {
		if err.is_contract_violation() {
			tracing::error!(error = %err, "contract violation while handling request");
			return (None, err);
		}

		for observer in &self.registry.fault_observers {
			observer(&err, ctx);
		}

		if self.config().propagate_exceptions() {
			return (None, err);
		}

		tracing::error!(
			error = %err,
			method = %ctx.request().method,
			path = %ctx.request().path(),
			"exception on request"
		);
		let server_error = Error::from(HttpError::internal_server_error());
		let response = match self.registry.error_handlers.find(&server_error, &ctx.scopes()) {
			Some(handler) => handler(&server_error).unwrap_or_else(|handler_err| {
				tracing::error!(error = %handler_err, "error handler for 500 failed");
				HttpError::internal_server_error().to_response()
			}),
			None => HttpError::internal_server_error().to_response(),
		};
		let response = self
			.finalize_request(ctx, response, true)
			.unwrap_or_else(|_| HttpError::internal_server_error().to_response());
		(Some(response), err)
	}

	/// Run the after-request callbacks.
	///
	/// A failure while finalizing the response of the 500 handler is logged
	/// and replaced by the default 500; any other failure is returned.
	fn finalize_request(
		&self,
		ctx: &RequestContext,
		response: Response,
		from_error_handler: bool,
	) -> Result<Response, Error> {
		ctx.set_stage(Stage::ResponseReady);
		match self.process_response(ctx, response) {
			Ok(response) => Ok(response),
			Err(err) if from_error_handler => {
				tracing::error!(
					error = %err,
					"request finalizing failed with an error while handling an error"
				);
				Ok(HttpError::internal_server_error().to_response())
			}
			Err(err) => Err(err),
		}
	}

	/// `after_this_request` callbacks first, then the after-request hooks of
	/// the innermost scope outwards, each list in reverse registration order.
	fn process_response(&self, ctx: &RequestContext, mut response: Response) -> Result<Response, Error> {
		ctx.set_stage(Stage::Finalizing);
		for callback in ctx.take_after_this_request() {
			response = callback(response)?;
		}
		for scope in ctx.scopes() {
			for hook in self.registry.after_request.get(&scope).iter().rev() {
				response = hook(ctx, response)?;
			}
		}
		Ok(response)
	}
}

fn options_response(allowed: &[Method]) -> Response {
	let mut response = Response::ok();
	let allow = allowed
		.iter()
		.map(Method::as_str)
		.collect::<Vec<_>>()
		.join(", ");
	if let Ok(value) = HeaderValue::from_str(&allow) {
		response.set_header(header::ALLOW, value);
	}
	response
}

fn teardown(ctx: &Arc<RequestContext>, fault: Option<&Error>) -> Result<(), Error> {
	ctx.pop(fault).map_err(|violation| {
		tracing::error!(error = %violation, "failed to pop request context");
		Error::from(violation)
	})
}

/// Pops the request context if the `handle` future is dropped before
/// dispatch completes.
struct TeardownGuard {
	ctx: Option<Arc<RequestContext>>,
}

impl TeardownGuard {
	fn new(ctx: Arc<RequestContext>) -> Self {
		Self { ctx: Some(ctx) }
	}

	fn disarm(&mut self) {
		self.ctx = None;
	}
}

impl Drop for TeardownGuard {
	fn drop(&mut self) {
		let Some(ctx) = self.ctx.take() else {
			return;
		};
		tracing::warn!(ctx = ?ctx, "request cancelled before completion; tearing down");

		let request_frame = Frame::Request(ctx.clone());
		let on_task_stack = stack::with_stack(|stack| stack.contains(&request_frame)).unwrap_or(false);
		let result = if on_task_stack {
			ctx.pop(None)
		} else {
			let mut frames = ContextStack::new();
			if ctx.created_app_context()
				&& let Some(app_ctx) = ctx.app_context()
			{
				frames.push(Frame::App(app_ctx.clone()));
			}
			frames.push(request_frame);
			stack::sync_scope(frames, || ctx.pop(None))
		};
		if let Err(violation) = result {
			tracing::error!(error = %violation, "failed to tear down cancelled request");
		}
	}
}
