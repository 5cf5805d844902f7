use crate::sources::{ConfigSource, DefaultSource, SourceError};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Flat, upper-case keyed configuration.
///
/// Built once at setup; the request lifecycle only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
	values: IndexMap<String, Value>,
}

impl Default for Config {
	fn default() -> Self {
		let mut values = IndexMap::new();
		for (key, value) in Self::defaults() {
			values.insert(key.to_string(), value);
		}
		Self { values }
	}
}

impl Config {
	/// Configuration holding only the built-in defaults
	pub fn new() -> Self {
		Self::default()
	}

	fn defaults() -> [(&'static str, Value); 7] {
		[
			("DEBUG", Value::Bool(false)),
			("TESTING", Value::Bool(false)),
			("PROPAGATE_EXCEPTIONS", Value::Null),
			("TRAP_HTTP_EXCEPTIONS", Value::Bool(false)),
			("SERVER_NAME", Value::Null),
			("APPLICATION_ROOT", Value::String("/".to_string())),
			("PREFERRED_URL_SCHEME", Value::String("http".to_string())),
		]
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(&key.to_ascii_uppercase())
	}

	/// Set a value, normalizing the key to upper case
	pub fn set(&mut self, key: impl AsRef<str>, value: Value) {
		self.values.insert(key.as_ref().to_ascii_uppercase(), value);
	}

	/// A truthy reading of a value: booleans, non-zero numbers and the
	/// strings `true`, `1`, `yes`, `on`
	pub fn get_bool(&self, key: &str) -> Option<bool> {
		match self.get(key)? {
			Value::Bool(value) => Some(*value),
			Value::Number(number) => Some(number.as_f64().is_some_and(|n| n != 0.0)),
			Value::String(text) => Some(matches!(
				text.trim().to_ascii_lowercase().as_str(),
				"true" | "1" | "yes" | "on"
			)),
			Value::Null => None,
			_ => Some(true),
		}
	}

	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.get(key).and_then(Value::as_str)
	}

	/// Deserialize a value into a typed structure
	///
	/// # Errors
	///
	/// Returns the deserialization error if the stored value has the wrong shape.
	pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<Result<T, serde_json::Error>> {
		self.get(key).map(|value| serde_json::from_value(value.clone()))
	}

	pub fn debug(&self) -> bool {
		self.get_bool("DEBUG").unwrap_or(false)
	}

	pub fn testing(&self) -> bool {
		self.get_bool("TESTING").unwrap_or(false)
	}

	/// Whether unhandled faults are returned to the caller instead of being
	/// rendered as a 500. Defaults to `TESTING || DEBUG` when unset.
	pub fn propagate_exceptions(&self) -> bool {
		self.get_bool("PROPAGATE_EXCEPTIONS")
			.unwrap_or_else(|| self.testing() || self.debug())
	}

	/// Whether HTTP errors are routed like handler faults
	pub fn trap_http_exceptions(&self) -> bool {
		self.get_bool("TRAP_HTTP_EXCEPTIONS").unwrap_or(false)
	}

	pub fn server_name(&self) -> Option<&str> {
		self.get_str("SERVER_NAME").filter(|name| !name.is_empty())
	}

	pub fn application_root(&self) -> &str {
		self.get_str("APPLICATION_ROOT").unwrap_or("/")
	}

	pub fn preferred_url_scheme(&self) -> &str {
		self.get_str("PREFERRED_URL_SCHEME").unwrap_or("http")
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.values.iter().map(|(key, value)| (key.as_str(), value))
	}
}

/// Merges [`ConfigSource`]s by priority on top of the built-in defaults.
///
/// Sources with equal priority are applied in the order they were added, so
/// the later one wins.
#[derive(Default)]
pub struct ConfigBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	pub fn add_boxed_source(mut self, source: Box<dyn ConfigSource>) -> Self {
		self.sources.push(source);
		self
	}

	/// # Errors
	///
	/// Returns the first [`SourceError`] raised while loading a source.
	pub fn build(mut self) -> Result<Config, SourceError> {
		self.sources.sort_by_key(|source| source.priority());

		let mut config = Config::new();
		for source in &self.sources {
			let values = source.load()?;
			tracing::debug!(
				source = %source.description(),
				keys = values.len(),
				"loaded configuration source"
			);
			for (key, value) in values {
				config.set(key, value);
			}
		}
		Ok(config)
	}
}

impl From<DefaultSource> for ConfigBuilder {
	fn from(source: DefaultSource) -> Self {
		ConfigBuilder::new().add_source(source)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_defaults() {
		let config = Config::new();

		assert!(!config.debug());
		assert!(!config.testing());
		assert!(!config.propagate_exceptions());
		assert!(!config.trap_http_exceptions());
		assert_eq!(config.server_name(), None);
		assert_eq!(config.application_root(), "/");
		assert_eq!(config.preferred_url_scheme(), "http");
	}

	#[rstest]
	#[case(false, false, Value::Null, false)]
	#[case(true, false, Value::Null, true)]
	#[case(false, true, Value::Null, true)]
	#[case(true, true, json!(false), false)]
	#[case(false, false, json!(true), true)]
	fn test_propagate_exceptions(
		#[case] debug: bool,
		#[case] testing: bool,
		#[case] explicit: Value,
		#[case] expected: bool,
	) {
		let mut config = Config::new();
		config.set("DEBUG", json!(debug));
		config.set("TESTING", json!(testing));
		config.set("PROPAGATE_EXCEPTIONS", explicit);

		assert_eq!(config.propagate_exceptions(), expected);
	}

	#[rstest]
	fn test_keys_are_case_insensitive() {
		let mut config = Config::new();
		config.set("server_name", json!("example.com"));

		assert_eq!(config.server_name(), Some("example.com"));
		assert_eq!(config.get_str("Server_Name"), Some("example.com"));
	}

	#[rstest]
	fn test_get_as_typed() {
		let mut config = Config::new();
		config.set("ALLOWED", json!(["a", "b"]));

		let allowed: Vec<String> = config.get_as("ALLOWED").unwrap().unwrap();
		assert_eq!(allowed, vec!["a".to_string(), "b".to_string()]);
		assert!(config.get_as::<Vec<String>>("MISSING").is_none());
	}
}
