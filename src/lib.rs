//! # Carafe
//!
//! The request-handling core of a small web framework: an application
//! object with scoped hooks and error handlers, a task-local stack of
//! application and request contexts, and the lifecycle that drives one
//! request from routing to teardown.
//!
//! ## Crates
//!
//! - [`http`] (`carafe-http`) - request, response, body and the fault taxonomy
//! - [`urls`] (`carafe-urls`) - rules, the url map and the router contract
//! - [`conf`] (`carafe-conf`) - layered configuration
//! - [`apps`] (`carafe-apps`) - application, contexts and dispatcher
//!
//! ## Feature Flags
//!
//! - `testing` - the in-process [`apps::testing::TestClient`]
//!
//! ## Example
//!
//! ```rust
//! use carafe::prelude::*;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mut app = Application::new("hello");
//! app.route("/hello/{name}", "hello", |params: PathParams| async move {
//!     let name = params.get_str("name").unwrap_or("world").to_string();
//!     Ok::<_, Error>((format!("hello {name}"), 201, [("X-Greeting", "1")]))
//! })
//! .unwrap();
//! app.teardown_request(Scope::App, |_fault| Ok(())).unwrap();
//! let app = Arc::new(app);
//!
//! let request = Request::builder().uri("/hello/ferris").build().unwrap();
//! let response = app.handle(request).await.unwrap();
//! assert_eq!(response.status, StatusCode::CREATED);
//! assert_eq!(response.header("x-greeting"), Some("1"));
//! # });
//! ```

pub use carafe_apps as apps;
pub use carafe_conf as conf;
pub use carafe_http as http;
pub use carafe_urls as urls;

pub use carafe_apps::{AppContext, Application, RequestContext, Scope, SetupError, globals};
pub use carafe_conf::{Config, ConfigBuilder};
pub use carafe_http::{ContractViolation, Error, HttpError, Request, Response, abort};
pub use carafe_urls::{PathParams, Rule, UrlMap};

/// Everything needed to define and serve an application
pub mod prelude {
	pub use carafe_apps::globals::{self, after_this_request, current_app, g, request_context, url_for};
	pub use carafe_apps::{Application, RequestContext, Scope, SetupError};
	pub use carafe_conf::Config;
	pub use carafe_http::{
		Error, HttpError, IntoResponse, Method, Request, Response, StatusCode, abort,
	};
	pub use carafe_urls::{ParamValue, PathParams, Rule};
}
