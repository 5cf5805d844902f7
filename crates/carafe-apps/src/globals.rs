//! Accessors for the current application and request
//!
//! These read the task's context stack. Outside a pushed context they fail
//! with [`ContractViolation::OutsideContext`] rather than panicking.
//!
//! ```
//! use carafe_apps::globals;
//!
//! assert!(!globals::has_request_context());
//! assert!(globals::current_app().is_err());
//! ```

use crate::app::Application;
use crate::ctx::{AppContext, RequestContext};
use crate::stack;
use crate::streaming::ContextStream;
use carafe_http::{ContractViolation, Error, Extensions, Response};
use carafe_urls::PathParams;
use std::sync::Arc;

pub fn app_context() -> Result<Arc<AppContext>, ContractViolation> {
	stack::top_app().ok_or(ContractViolation::OutsideContext("application"))
}

pub fn request_context() -> Result<Arc<RequestContext>, ContractViolation> {
	stack::top_request().ok_or(ContractViolation::OutsideContext("request"))
}

/// The application of the current application context
pub fn current_app() -> Result<Arc<Application>, ContractViolation> {
	app_context().map(|ctx| ctx.app().clone())
}

pub fn has_app_context() -> bool {
	stack::top_app().is_some()
}

pub fn has_request_context() -> bool {
	stack::top_request().is_some()
}

/// Storage of the current application context
pub fn g() -> Result<Extensions, ContractViolation> {
	app_context().map(|ctx| ctx.g().clone())
}

/// Register a callback for the response of the current request only.
pub fn after_this_request<F>(f: F) -> Result<(), ContractViolation>
where
	F: FnOnce(Response) -> Result<Response, Error> + Send + 'static,
{
	request_context()?.after_this_request(f);
	Ok(())
}

/// Build a URL for `endpoint`.
///
/// Inside a request an endpoint starting with `.` is relative to the
/// current blueprint. Works inside a bare application context too.
pub fn url_for(endpoint: &str, values: PathParams) -> Result<String, Error> {
	let app = current_app()?;
	let request = stack::top_request();
	let blueprint = request.as_deref().and_then(RequestContext::blueprint);
	app.build_url(endpoint, values, blueprint)
}

/// Keep the current request context alive for as long as `stream` is
/// being consumed, and poll it inside that context.
///
/// # Examples
///
/// ```
/// use carafe_apps::{Application, globals};
/// use carafe_http::{Error, Response, Request};
/// use carafe_urls::PathParams;
/// use bytes::Bytes;
/// use futures::stream;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let mut app = Application::new("stream");
/// app.route("/", "index", |_params: PathParams| async move {
///     let chunks = stream::iter(vec![Ok(Bytes::from("a")), Ok(Bytes::from("b"))]);
///     Ok::<_, Error>(Response::ok().with_stream(globals::stream_with_context(chunks)?))
/// })
/// .unwrap();
/// let app = Arc::new(app);
///
/// let request = Request::builder().uri("/").build().unwrap();
/// let response = app.handle(request).await.unwrap();
/// assert_eq!(response.into_bytes().await.unwrap(), Bytes::from("ab"));
/// # });
/// ```
pub fn stream_with_context<S>(stream: S) -> Result<ContextStream<S>, ContractViolation> {
	Ok(ContextStream::new(request_context()?, stream))
}
