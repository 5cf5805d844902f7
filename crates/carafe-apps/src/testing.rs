//! In-process test client
//!
//! Sends requests straight through [`Application::handle`] and buffers the
//! response body, so tests can assert on plain bytes.

use crate::app::Application;
use bytes::Bytes;
use carafe_http::{Error, HeaderMap, Method, Request, StatusCode};
use std::sync::Arc;

pub struct TestClient {
	app: Arc<Application>,
}

/// A response with its body fully read.
#[derive(Debug, Clone)]
pub struct TestResponse {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl TestResponse {
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}
}

impl TestClient {
	pub fn new(app: Arc<Application>) -> Self {
		Self { app }
	}

	pub fn app(&self) -> &Arc<Application> {
		&self.app
	}

	pub async fn get(&self, uri: &str) -> Result<TestResponse, Error> {
		self.send(Method::GET, uri, Bytes::new()).await
	}

	pub async fn post(&self, uri: &str, body: impl Into<Bytes>) -> Result<TestResponse, Error> {
		self.send(Method::POST, uri, body.into()).await
	}

	async fn send(&self, method: Method, uri: &str, body: Bytes) -> Result<TestResponse, Error> {
		let request = Request::builder()
			.method(method)
			.uri(uri)
			.body(body)
			.build()
			.map_err(Error::handler)?;
		self.request(request).await
	}

	/// Send a fully built request
	pub async fn request(&self, request: Request) -> Result<TestResponse, Error> {
		let response = self.app.handle(request).await?;
		let status = response.status;
		let headers = response.headers.clone();
		let body = response.into_bytes().await?;
		Ok(TestResponse {
			status,
			headers,
			body,
		})
	}
}
