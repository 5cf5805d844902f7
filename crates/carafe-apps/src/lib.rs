//! # Carafe Apps
//!
//! The application object and the request lifecycle around it.
//!
//! ## Overview
//!
//! An [`Application`] owns a URL map, the view functions of its endpoints
//! and a [`Registry`] of hooks and error handlers. It is configured through
//! `&mut self` methods, then wrapped in an `Arc` and driven with
//! [`Application::handle`].
//!
//! Every request runs inside a task-local [`ContextStack`]:
//!
//! - an [`AppContext`] binds the current application and is reference
//!   counted, so nested work reuses it
//! - a [`RequestContext`] binds the request and its routing outcome, and is
//!   popped exactly once, running the teardown hooks
//!
//! The current contexts are reachable from anywhere in the task through
//! [`globals`].
//!
//! ## Modules
//!
//! - [`app`]: [`Application`] and its registration methods
//! - [`ctx`]: [`AppContext`] and [`RequestContext`]
//! - [`dispatch`]: the lifecycle state machine behind [`Application::handle`]
//! - [`error_handlers`]: error handler tables and lookup
//! - [`globals`]: accessors for the current application and request
//! - [`registry`]: hook lists keyed by [`Scope`]
//! - [`stack`]: the task-local context stack
//! - [`streaming`]: bodies that run inside their request's context
//!
//! ## Quick Start
//!
//! ```rust
//! use carafe_apps::{Application, Scope, globals};
//! use carafe_http::{Error, Request, StatusCode};
//! use carafe_urls::PathParams;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mut app = Application::new("greeter");
//! app.route("/hello/{name}", "hello", |params: PathParams| async move {
//!     let app = globals::current_app()?;
//!     Ok::<_, Error>(format!("{} says hello to {}", app.name(), params.get_str("name").unwrap_or("?")))
//! })
//! .unwrap();
//! app.after_request(Scope::App, |_ctx, response| Ok(response.with_header("X-Served-By", "carafe")))
//!     .unwrap();
//! let app = Arc::new(app);
//!
//! let request = Request::builder().uri("/hello/ada").build().unwrap();
//! let response = app.handle(request).await.unwrap();
//! assert_eq!(response.status, StatusCode::OK);
//! assert_eq!(response.header("x-served-by"), Some("carafe"));
//! # });
//! ```

pub mod app;
pub mod ctx;
pub mod dispatch;
pub mod error;
pub mod error_handlers;
pub mod globals;
pub mod registry;
pub mod scope;
pub mod stack;
pub mod streaming;
pub mod view;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use app::Application;
pub use ctx::{AppContext, RequestContext, Stage};
pub use error::SetupError;
pub use error_handlers::{ErrorHandlerFn, ErrorHandlers};
pub use registry::{Registry, ScopedHooks};
pub use scope::Scope;
pub use stack::{ContextStack, Frame};
pub use streaming::ContextStream;
pub use view::View;
