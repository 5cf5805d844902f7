//! An application assembled only from the facade

use bytes::Bytes;
use carafe::conf::{ConfigBuilder, DefaultSource};
use carafe::prelude::*;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;

fn blog() -> Application {
	let mut app = Application::new("blog");
	app.route("/posts/{id:int}", "posts.show", |params: PathParams| async move {
		let id = params.get_int("id").unwrap_or_default();
		if id == 0 {
			return Err(abort(404));
		}
		let link = url_for("posts.show", [("id", id)].into_iter().collect())?;
		Ok(format!("post {id} at {link}"))
	})
	.unwrap();
	app
}

#[rstest]
#[tokio::test]
async fn test_serves_through_facade() {
	let app = Arc::new(blog());

	let request = Request::builder().uri("/posts/3").build().unwrap();
	let response = app.handle(request).await.unwrap();

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(
		response.into_bytes().await.unwrap(),
		Bytes::from("post 3 at /posts/3")
	);
}

#[rstest]
#[tokio::test]
async fn test_abort_renders_default_page() {
	let app = Arc::new(blog());

	let request = Request::builder().uri("/posts/0").build().unwrap();
	let response = app.handle(request).await.unwrap();

	assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn test_server_name_from_layered_config() {
	let config = ConfigBuilder::new()
		.add_source(DefaultSource::new().with_value("SERVER_NAME", json!("blog.example")))
		.build()
		.unwrap();
	let app = Arc::new(blog().with_config(config));

	let foreign = Request::builder()
		.uri("/posts/3")
		.header("Host", "other.example")
		.build()
		.unwrap();
	assert_eq!(app.handle(foreign).await.unwrap().status, StatusCode::NOT_FOUND);

	let own = Request::builder()
		.uri("/posts/3")
		.header("Host", "blog.example")
		.build()
		.unwrap();
	assert_eq!(app.handle(own).await.unwrap().status, StatusCode::OK);
}
