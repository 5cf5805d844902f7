use async_trait::async_trait;
use carafe_http::{Error, IntoResponse, Response};
use carafe_urls::PathParams;
use std::future::Future;

/// A view function: invoked with the captured path parameters.
///
/// The current request and application are reachable through
/// [`crate::globals`]. Any `async` closure or function taking [`PathParams`]
/// and returning `Result<impl IntoResponse, impl Into<Error>>` is a view.
///
/// # Examples
///
/// ```
/// use carafe_apps::View;
/// use carafe_http::Error;
/// use carafe_urls::PathParams;
///
/// async fn hello(params: PathParams) -> Result<String, Error> {
///     Ok(format!("hello {}", params.get_str("name").unwrap_or("world")))
/// }
///
/// fn assert_view<V: View>(_: V) {}
/// assert_view(hello);
/// ```
#[async_trait]
pub trait View: Send + Sync {
	async fn call(&self, params: PathParams) -> Result<Response, Error>;
}

#[async_trait]
impl<F, Fut, R, E> View for F
where
	F: Fn(PathParams) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<R, E>> + Send + 'static,
	R: IntoResponse + Send + 'static,
	E: Into<Error> + Send + 'static,
{
	async fn call(&self, params: PathParams) -> Result<Response, Error> {
		let value = (self)(params).await.map_err(Into::into)?;
		Ok(value.into_response()?)
	}
}
