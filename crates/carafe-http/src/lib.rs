//! # Carafe HTTP
//!
//! Request, response and error types shared by every layer of the carafe
//! request lifecycle.
//!
//! ## Overview
//!
//! - [`Request`] - one inbound request, built with [`Request::builder`]
//! - [`Response`] - status, ordered headers (duplicates allowed) and a [`Body`]
//! - [`IntoResponse`] - the canonical conversion from handler return values
//! - [`Error`] - the fault taxonomy: HTTP errors, handler faults and
//!   contract violations
//! - [`Extensions`] - type-keyed storage used for request, context and
//!   application state
//!
//! ## Examples
//!
//! ```rust
//! use carafe_http::{IntoResponse, Response};
//! use http::StatusCode;
//!
//! let response = ("hello", 201, [("X-Test", "1")]).into_response().unwrap();
//! assert_eq!(response.status, StatusCode::CREATED);
//! assert_eq!(response.header("x-test"), Some("1"));
//! ```

pub mod body;
pub mod error;
pub mod extensions;
pub mod into_response;
pub mod request;
pub mod response;

pub use body::{Body, StreamBody};
pub use error::{BoxError, ContractViolation, Error, HttpError, Result, abort};
pub use extensions::Extensions;
pub use into_response::{IntoBody, IntoHeaders, IntoResponse, IntoStatus};
pub use request::{Request, RequestBuilder};
pub use response::Response;

// Re-exported so downstream crates agree on one version of the HTTP primitives
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
