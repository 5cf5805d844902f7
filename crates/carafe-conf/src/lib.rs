//! # Carafe Conf
//!
//! The configuration surface read by the request lifecycle: a flat map of
//! upper-case keys to JSON values, assembled from layered sources and
//! treated as read-only once the application starts serving.
//!
//! Sources are merged by priority (higher wins):
//!
//! | source             | priority |
//! |--------------------|----------|
//! | [`EnvSource`]      | 100      |
//! | [`TomlFileSource`] | 50       |
//! | [`JsonFileSource`] | 50       |
//! | [`DefaultSource`]  | 0        |
//!
//! ## Examples
//!
//! ```rust
//! use carafe_conf::{ConfigBuilder, DefaultSource};
//! use serde_json::json;
//!
//! let config = ConfigBuilder::new()
//!     .add_source(DefaultSource::new().with_value("debug", json!(true)))
//!     .build()
//!     .unwrap();
//!
//! assert!(config.debug());
//! assert!(config.propagate_exceptions());
//! assert_eq!(config.server_name(), None);
//! ```

pub mod config;
pub mod sources;

pub use config::{Config, ConfigBuilder};
pub use sources::{
	ConfigSource, DefaultSource, EnvSource, JsonFileSource, SourceError, TomlFileSource,
	auto_source,
};
