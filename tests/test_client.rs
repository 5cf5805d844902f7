//! Driving an application through the in-process test client

use carafe::apps::testing::TestClient;
use carafe::prelude::*;
use rstest::rstest;
use std::sync::Arc;

fn notes() -> TestClient {
	let mut app = Application::new("notes");
	app.route_methods("/notes", "notes.create", [Method::POST], |_params: PathParams| async {
		let ctx = request_context()?;
		let text = String::from_utf8_lossy(&ctx.request().body).into_owned();
		Ok::<_, Error>((format!("saved {text}"), 201, [("Location", "/notes/1")]))
	})
	.unwrap();
	TestClient::new(Arc::new(app))
}

#[rstest]
#[tokio::test]
async fn test_post_creates_note() {
	let client = notes();

	let response = client.post("/notes", "buy tea").await.unwrap();

	assert_eq!(response.status, StatusCode::CREATED);
	assert_eq!(response.text(), "saved buy tea");
	assert_eq!(response.header("location"), Some("/notes/1"));
}

#[rstest]
#[tokio::test]
async fn test_get_on_post_only_route_is_rejected() {
	let client = notes();

	let response = client.get("/notes").await.unwrap();

	assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
	assert!(response.header("allow").is_some_and(|allow| allow.contains("POST")));
}
