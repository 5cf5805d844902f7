//! Configuration sources for the layered config
//!
//! Sources are merged in priority order (environment variables > config
//! files > defaults). Keys are normalized to upper case by the builder.

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Invalid source: {0}")]
	InvalidSource(String),
}

/// Environment variable configuration source
///
/// Only variables starting with the prefix (default `CARAFE_`) are read; the
/// prefix is stripped from the key.
pub struct EnvSource {
	prefix: String,
}

impl EnvSource {
	pub const DEFAULT_PREFIX: &'static str = "CARAFE_";

	/// # Examples
	///
	/// ```
	/// use carafe_conf::EnvSource;
	///
	/// let source = EnvSource::new().with_prefix("MYAPP_");
	/// ```
	pub fn new() -> Self {
		Self {
			prefix: Self::DEFAULT_PREFIX.to_string(),
		}
	}

	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

/// Interpret a raw environment value as the most specific JSON value.
fn parse_env_value(raw: String) -> Value {
	match raw.trim().to_ascii_lowercase().as_str() {
		"true" | "yes" | "on" => return Value::Bool(true),
		"false" | "no" | "off" => return Value::Bool(false),
		"null" | "none" => return Value::Null,
		_ => {}
	}
	if let Ok(number) = raw.trim().parse::<i64>() {
		return Value::Number(number.into());
	}
	Value::String(raw)
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();
		for (key, value) in std::env::vars() {
			let Some(name) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			if name.is_empty() {
				continue;
			}
			config.insert(name.to_string(), parse_env_value(value));
		}
		Ok(config)
	}

	fn priority(&self) -> u8 {
		100 // Highest priority
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

fn object_entries(value: Value) -> Result<IndexMap<String, Value>, SourceError> {
	match value {
		Value::Object(map) => Ok(map.into_iter().collect()),
		_ => Err(SourceError::Parse("Expected object at root".to_string())),
	}
}

/// TOML file configuration source
///
/// A missing file contributes nothing.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}
		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;
		object_entries(serde_json::to_value(toml_value)?)
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// JSON file configuration source
///
/// A missing file contributes nothing.
pub struct JsonFileSource {
	path: PathBuf,
}

impl JsonFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for JsonFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}
		let content = fs::read_to_string(&self.path)?;
		object_entries(serde_json::from_str(&content)?)
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("JSON file: {}", self.path.display())
	}
}

/// Default values configuration source
#[derive(Default)]
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	/// # Examples
	///
	/// ```
	/// use carafe_conf::DefaultSource;
	/// use serde_json::json;
	///
	/// let source = DefaultSource::new()
	///     .with_value("SECRET_KEY", json!("dev"))
	///     .with_value("MAX_CONTENT_LENGTH", json!(1024));
	/// ```
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0 // Lowest priority
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

/// Pick a file source from the extension
///
/// # Examples
///
/// ```
/// use carafe_conf::{ConfigSource, auto_source};
///
/// let source = auto_source("settings.toml").unwrap();
/// assert_eq!(source.priority(), 50);
/// assert!(auto_source("settings.ini").is_err());
/// ```
pub fn auto_source(path: impl AsRef<Path>) -> Result<Box<dyn ConfigSource>, SourceError> {
	let path = path.as_ref();
	let ext = path
		.extension()
		.and_then(|e| e.to_str())
		.ok_or_else(|| SourceError::InvalidSource("No file extension".to_string()))?;

	match ext {
		"toml" => Ok(Box::new(TomlFileSource::new(path))),
		"json" => Ok(Box::new(JsonFileSource::new(path))),
		_ => Err(SourceError::InvalidSource(format!(
			"Unsupported file extension: {}",
			ext
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("true", Value::Bool(true))]
	#[case("Off", Value::Bool(false))]
	#[case("8080", Value::Number(8080.into()))]
	#[case("null", Value::Null)]
	#[case("example.com", Value::String("example.com".into()))]
	fn test_parse_env_value(#[case] raw: &str, #[case] expected: Value) {
		assert_eq!(parse_env_value(raw.to_string()), expected);
	}

	#[rstest]
	fn test_missing_file_is_empty() {
		let source = TomlFileSource::new("/nonexistent/carafe.toml");
		assert!(source.load().unwrap().is_empty());
	}
}
