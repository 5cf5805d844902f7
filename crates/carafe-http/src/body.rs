//! Response bodies: fully buffered bytes or a lazily produced stream.

use crate::error::BoxError;
use bytes::{Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;

/// Type alias for a lazily produced body.
pub type StreamBody = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// The payload of a [`Response`](crate::Response).
pub enum Body {
	Full(Bytes),
	Stream(StreamBody),
}

impl Body {
	pub fn empty() -> Self {
		Body::Full(Bytes::new())
	}

	/// Wraps a stream of chunks as a lazily produced body.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Body;
	/// use bytes::Bytes;
	/// use futures::stream;
	///
	/// let chunks = vec![Ok(Bytes::from("a")), Ok(Bytes::from("b"))];
	/// let body = Body::from_stream(stream::iter(chunks));
	/// assert!(body.is_stream());
	/// ```
	pub fn from_stream<S>(stream: S) -> Self
	where
		S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
	{
		Body::Stream(Box::pin(stream))
	}

	pub fn is_stream(&self) -> bool {
		matches!(self, Body::Stream(_))
	}

	/// Returns the buffered bytes, or `None` for a streamed body.
	pub fn as_bytes(&self) -> Option<&Bytes> {
		match self {
			Body::Full(bytes) => Some(bytes),
			Body::Stream(_) => None,
		}
	}

	/// Drains the body into a single buffer.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Body;
	/// use bytes::Bytes;
	/// use futures::stream;
	///
	/// # tokio_test::block_on(async {
	/// let chunks = vec![Ok(Bytes::from("hello ")), Ok(Bytes::from("world"))];
	/// let body = Body::from_stream(stream::iter(chunks));
	/// assert_eq!(body.collect().await.unwrap(), Bytes::from("hello world"));
	/// # });
	/// ```
	pub async fn collect(self) -> Result<Bytes, BoxError> {
		match self {
			Body::Full(bytes) => Ok(bytes),
			Body::Stream(mut stream) => {
				let mut buffer = BytesMut::new();
				while let Some(chunk) = stream.next().await {
					buffer.extend_from_slice(&chunk?);
				}
				Ok(buffer.freeze())
			}
		}
	}
}

impl Default for Body {
	fn default() -> Self {
		Body::empty()
	}
}

impl fmt::Debug for Body {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Body::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
			Body::Stream(_) => f.write_str("Stream(..)"),
		}
	}
}

impl From<Bytes> for Body {
	fn from(bytes: Bytes) -> Self {
		Body::Full(bytes)
	}
}

impl From<&'static str> for Body {
	fn from(text: &'static str) -> Self {
		Body::Full(Bytes::from_static(text.as_bytes()))
	}
}

impl From<String> for Body {
	fn from(text: String) -> Self {
		Body::Full(Bytes::from(text))
	}
}

impl From<Vec<u8>> for Body {
	fn from(bytes: Vec<u8>) -> Self {
		Body::Full(Bytes::from(bytes))
	}
}
