//! Merging file, environment and default sources

use carafe_conf::{ConfigBuilder, DefaultSource, EnvSource, JsonFileSource, SourceError, TomlFileSource};
use rstest::rstest;
use serde_json::json;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_file(suffix: &str, content: &str) -> NamedTempFile {
	let mut file = tempfile::Builder::new()
		.suffix(suffix)
		.tempfile()
		.unwrap();
	file.write_all(content.as_bytes()).unwrap();
	file
}

#[rstest]
fn test_toml_overrides_defaults() {
	let file = write_file(
		".toml",
		r#"
debug = true
server_name = "example.com"
"#,
	);

	let config = ConfigBuilder::new()
		.add_source(DefaultSource::new().with_value("SERVER_NAME", json!("localhost")))
		.add_source(TomlFileSource::new(file.path()))
		.build()
		.unwrap();

	assert!(config.debug());
	assert_eq!(config.server_name(), Some("example.com"));
}

#[rstest]
fn test_later_source_of_equal_priority_wins() {
	let toml = write_file(".toml", "application_root = \"/a\"\n");
	let json = write_file(".json", r#"{"APPLICATION_ROOT": "/b"}"#);

	let config = ConfigBuilder::new()
		.add_source(TomlFileSource::new(toml.path()))
		.add_source(JsonFileSource::new(json.path()))
		.build()
		.unwrap();

	assert_eq!(config.application_root(), "/b");
}

#[rstest]
fn test_json_root_must_be_object() {
	let json = write_file(".json", "[1, 2, 3]");

	let result = ConfigBuilder::new()
		.add_source(JsonFileSource::new(json.path()))
		.build();

	assert!(matches!(result, Err(SourceError::Parse(_))));
}

#[rstest]
fn test_invalid_toml_is_reported() {
	let toml = write_file(".toml", "debug = \n");

	let result = ConfigBuilder::new()
		.add_source(TomlFileSource::new(toml.path()))
		.build();

	assert!(matches!(result, Err(SourceError::Toml(_))));
}

#[rstest]
#[serial(env)]
fn test_environment_has_highest_priority() {
	let toml = write_file(".toml", "testing = false\ntrap_http_exceptions = false\n");
	// SAFETY: serialized with every other test that touches the environment
	unsafe {
		std::env::set_var("CARAFE_TESTING", "1");
		std::env::set_var("CARAFE_TRAP_HTTP_EXCEPTIONS", "on");
	}

	let result = ConfigBuilder::new()
		.add_source(EnvSource::new())
		.add_source(TomlFileSource::new(toml.path()))
		.build();

	unsafe {
		std::env::remove_var("CARAFE_TESTING");
		std::env::remove_var("CARAFE_TRAP_HTTP_EXCEPTIONS");
	}

	let config = result.unwrap();
	assert!(config.testing());
	assert!(config.trap_http_exceptions());
	assert!(config.propagate_exceptions());
}

#[rstest]
#[serial(env)]
fn test_custom_env_prefix() {
	unsafe {
		std::env::set_var("MYAPP_SERVER_NAME", "api.example.com");
	}

	let result = ConfigBuilder::new()
		.add_source(EnvSource::new().with_prefix("MYAPP_"))
		.build();

	unsafe {
		std::env::remove_var("MYAPP_SERVER_NAME");
	}

	assert_eq!(result.unwrap().server_name(), Some("api.example.com"));
}
