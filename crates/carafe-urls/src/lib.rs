//! # Carafe URLs
//!
//! The router collaborator of the request lifecycle. A [`UrlMap`] holds
//! [`Rule`]s in registration order and answers one question per request:
//! given a method, path and host, which endpoint handles it?
//!
//! The answer is a [`Resolution`]:
//!
//! - [`Resolution::Matched`] - endpoint and captured [`PathParams`]
//! - [`Resolution::Redirect`] - the canonical URL differs (strict slashes)
//! - [`Resolution::NotFound`]
//! - [`Resolution::MethodNotAllowed`] - the path matched but not the method
//!
//! ## Pattern syntax
//!
//! - `{name}` - one path segment
//! - `{name:int}` - one segment of digits, captured as an integer
//! - `{name:path}` - the rest of the path, slashes included
//!
//! ## Examples
//!
//! ```rust
//! use carafe_urls::{MatchRequest, Resolution, Rule, UrlMap, UrlResolver};
//! use http::Method;
//!
//! let mut map = UrlMap::new();
//! map.add(Rule::new("/users/{id:int}", "user_detail").unwrap());
//!
//! match map.resolve(&MatchRequest::new(Method::GET, "/users/42")) {
//!     Resolution::Matched(route) => {
//!         assert_eq!(route.endpoint, "user_detail");
//!         assert_eq!(route.params.get_int("id"), Some(42));
//!     }
//!     other => panic!("unexpected resolution: {other:?}"),
//! }
//! ```

pub mod error;
pub mod map;
pub mod params;
pub mod pattern;
pub mod resolution;
pub mod rule;

pub use error::{BuildError, PatternError};
pub use map::UrlMap;
pub use params::{ParamValue, PathParams};
pub use pattern::{Converter, PathPattern};
pub use resolution::{MatchRequest, Resolution, RouteMatch, UrlResolver};
pub use rule::Rule;
