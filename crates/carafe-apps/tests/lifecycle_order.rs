//! Ordering of hooks around the view

use bytes::Bytes;
use carafe_apps::{Application, Scope, globals, stack};
use carafe_http::{Error, Method, Request, Response, StatusCode};
use carafe_urls::PathParams;
use parking_lot::Mutex;
use rstest::{fixture, rstest};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

#[fixture]
fn log() -> Log {
	Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &Log, entry: impl Into<String>) {
	log.lock().push(entry.into());
}

fn get(path: &str) -> Request {
	Request::builder().uri(path).build().unwrap()
}

async fn body(response: Response) -> String {
	let bytes: Bytes = response.into_bytes().await.unwrap();
	String::from_utf8(bytes.to_vec()).unwrap()
}

fn recording_app(log: &Log) -> Application {
	let mut app = Application::new("lifecycle");
	let view_log = log.clone();
	app.route("/", "index", move |_params: PathParams| {
		let log = view_log.clone();
		async move {
			record(&log, "view");
			Ok::<_, Error>("index")
		}
	})
	.unwrap();
	app
}

#[rstest]
#[tokio::test]
async fn test_before_request_short_circuit_skips_rest(log: Log) {
	let mut app = recording_app(&log);
	for name in ["first", "second", "third"] {
		let log = log.clone();
		app.before_request(Scope::App, move |_ctx| {
			record(&log, name);
			if name == "second" {
				Ok(Some(Response::new(StatusCode::ACCEPTED).with_body("stopped")))
			} else {
				Ok(None)
			}
		})
		.unwrap();
	}
	let app = Arc::new(app);

	let response = app.handle(get("/")).await.unwrap();

	assert_eq!(response.status, StatusCode::ACCEPTED);
	assert_eq!(body(response).await, "stopped");
	assert_eq!(*log.lock(), vec!["first", "second"]);
}

#[rstest]
#[tokio::test]
async fn test_after_and_teardown_run_in_reverse_order(log: Log) {
	let mut app = recording_app(&log);
	for name in ["A", "B", "C"] {
		let after_log = log.clone();
		app.after_request(Scope::App, move |_ctx, response| {
			record(&after_log, format!("after {name}"));
			Ok(response)
		})
		.unwrap();
		let teardown_log = log.clone();
		app.teardown_request(Scope::App, move |_fault| {
			record(&teardown_log, format!("teardown {name}"));
			Ok(())
		})
		.unwrap();
	}
	let app = Arc::new(app);

	app.handle(get("/")).await.unwrap();

	assert_eq!(
		*log.lock(),
		vec![
			"view",
			"after C",
			"after B",
			"after A",
			"teardown C",
			"teardown B",
			"teardown A",
		]
	);
}

#[rstest]
#[tokio::test]
async fn test_teardown_order_holds_on_failure(log: Log) {
	let mut app = Application::new("failing");
	app.route("/", "index", |_params: PathParams| async {
		Err::<&str, _>(Error::handler("boom"))
	})
	.unwrap();
	for name in ["A", "B", "C"] {
		let log = log.clone();
		app.teardown_request(Scope::App, move |fault| {
			record(&log, format!("{name} {}", fault.is_some()));
			Ok(())
		})
		.unwrap();
	}
	let app = Arc::new(app);

	let response = app.handle(get("/")).await.unwrap();

	assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(*log.lock(), vec!["C true", "B true", "A true"]);
}

#[rstest]
#[tokio::test]
async fn test_teardown_failure_does_not_stop_others(log: Log) {
	let mut app = recording_app(&log);
	let first = log.clone();
	app.teardown_request(Scope::App, move |_| {
		record(&first, "first");
		Ok(())
	})
	.unwrap();
	app.teardown_request(Scope::App, |_| Err(Error::handler("teardown failed")))
		.unwrap();
	let app = Arc::new(app);

	let response = app.handle(get("/")).await.unwrap();

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(*log.lock(), vec!["view", "first"]);
}

#[rstest]
#[tokio::test]
async fn test_hooks_nest_blueprint_inside_app(log: Log) {
	let mut app = Application::new("nested");
	app.route("/admin/", "admin.index", |_params: PathParams| async {
		Ok::<_, Error>("admin")
	})
	.unwrap();
	for scope in [Scope::App, Scope::blueprint("admin")] {
		let before = log.clone();
		let label = scope.to_string();
		app.before_request(scope.clone(), move |_ctx| {
			record(&before, format!("before {label}"));
			Ok(None)
		})
		.unwrap();
		let after = log.clone();
		let label = scope.to_string();
		app.after_request(scope, move |_ctx, response| {
			record(&after, format!("after {label}"));
			Ok(response)
		})
		.unwrap();
	}
	let app = Arc::new(app);

	app.handle(get("/admin/")).await.unwrap();

	assert_eq!(
		*log.lock(),
		vec![
			"before <app>",
			"before admin",
			"after admin",
			"after <app>"
		]
	);
}

#[rstest]
#[tokio::test]
async fn test_url_value_preprocessor_rewrites_view_args() {
	let mut app = Application::new("i18n");
	app.route("/{lang}/about", "about", |params: PathParams| async move {
		Ok::<_, Error>(format!(
			"lang={:?} page={}",
			params.get_str("lang"),
			params.get_str("page").unwrap_or_default()
		))
	})
	.unwrap();
	app.url_value_preprocessor(Scope::App, |endpoint, values| {
		assert_eq!(endpoint, Some("about"));
		let lang = values.remove("lang");
		globals::g()?.insert(lang.map(|value| value.to_string()));
		values.insert("page", "about");
		Ok(())
	})
	.unwrap();
	app.before_request(Scope::App, |_ctx| {
		let lang: Option<Option<String>> = globals::g()?.get();
		assert_eq!(lang, Some(Some("fr".to_string())));
		Ok(None)
	})
	.unwrap();
	let app = Arc::new(app);

	let response = app.handle(get("/fr/about")).await.unwrap();

	assert_eq!(body(response).await, "lang=None page=about");
}

#[rstest]
#[tokio::test]
async fn test_after_hooks_chain_responses() {
	let mut app = Application::new("chain");
	app.route("/", "index", |_params: PathParams| async { Ok::<_, Error>("body") })
		.unwrap();
	app.after_request(Scope::App, |_ctx, response| {
		let seen = response.header("x-inner").unwrap_or("missing").to_string();
		Ok(response.with_header("X-Outer", &seen))
	})
	.unwrap();
	app.after_request(Scope::App, |_ctx, response| {
		Ok(response.with_header("X-Inner", "1"))
	})
	.unwrap();
	app.after_request(Scope::App, |_ctx, _response| {
		Ok(Response::new(StatusCode::CREATED).with_body("replaced"))
	})
	.unwrap();
	let app = Arc::new(app);

	let response = app.handle(get("/")).await.unwrap();

	assert_eq!(response.status, StatusCode::CREATED);
	assert_eq!(response.header("x-inner"), Some("1"));
	assert_eq!(response.header("x-outer"), Some("1"));
	assert_eq!(body(response).await, "replaced");
}

#[rstest]
#[tokio::test]
async fn test_after_this_request_runs_before_hooks(log: Log) {
	let mut app = Application::new("once");
	let view_log = log.clone();
	app.route("/", "index", move |_params: PathParams| {
		let log = view_log.clone();
		async move {
			globals::after_this_request(move |response| {
				record(&log, "this request");
				Ok(response)
			})?;
			Ok::<_, Error>("ok")
		}
	})
	.unwrap();
	let hook_log = log.clone();
	app.after_request(Scope::App, move |_ctx, response| {
		record(&hook_log, "after");
		Ok(response)
	})
	.unwrap();
	let app = Arc::new(app);

	app.handle(get("/")).await.unwrap();
	assert_eq!(*log.lock(), vec!["this request", "after"]);
}

#[rstest]
#[tokio::test]
async fn test_automatic_options_lists_allowed_methods() {
	let mut app = Application::new("options");
	app.route_methods("/items", "items", [Method::GET, Method::POST], |_params: PathParams| async {
		Ok::<_, Error>("items")
	})
	.unwrap();
	let app = Arc::new(app);

	let request = Request::builder()
		.method(Method::OPTIONS)
		.uri("/items")
		.build()
		.unwrap();
	let response = app.handle(request).await.unwrap();

	assert_eq!(response.status, StatusCode::OK);
	let allow = response.header("allow").unwrap();
	for method in ["GET", "HEAD", "POST", "OPTIONS"] {
		assert!(allow.contains(method), "{method} missing from {allow}");
	}
}

#[rstest]
#[tokio::test]
async fn test_redirect_skips_preprocessing(log: Log) {
	let mut app = Application::new("slashes");
	app.route("/docs/", "docs", |_params: PathParams| async { Ok::<_, Error>("docs") })
		.unwrap();
	let before = log.clone();
	app.before_request(Scope::App, move |_ctx| {
		record(&before, "before");
		Ok(None)
	})
	.unwrap();
	let after = log.clone();
	app.after_request(Scope::App, move |_ctx, response| {
		record(&after, "after");
		Ok(response)
	})
	.unwrap();
	let app = Arc::new(app);

	let response = app.handle(get("/docs?page=2")).await.unwrap();

	assert_eq!(response.status, StatusCode::PERMANENT_REDIRECT);
	assert_eq!(response.header("location"), Some("/docs/?page=2"));
	assert_eq!(*log.lock(), vec!["after"]);
}

#[rstest]
#[tokio::test]
async fn test_push_pop_balance_across_outcomes() {
	let mut app = Application::new("balance");
	app.route("/ok", "ok", |_params: PathParams| async { Ok::<_, Error>("ok") })
		.unwrap();
	app.route("/fail", "fail", |_params: PathParams| async {
		Err::<&str, _>(Error::handler("view failed"))
	})
	.unwrap();
	app.route("/hook", "hook", |_params: PathParams| async { Ok::<_, Error>("hook") })
		.unwrap();
	app.before_request(Scope::App, |ctx| match ctx.endpoint() {
		Some("hook") => Err(Error::handler("hook failed")),
		_ => Ok(None),
	})
	.unwrap();
	let app = Arc::new(app);

	stack::scope(async {
		for path in ["/ok", "/fail", "/hook", "/missing"] {
			let response = app.handle(get(path)).await.unwrap();
			assert!(response.status.is_success() || response.status.is_client_error() || response.status.is_server_error());
			assert_eq!(stack::depth(), 0, "unbalanced after {path}");
		}
	})
	.await;
}
