//! Error types for URL rules.

use thiserror::Error;

/// A rule pattern that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
	#[error("pattern length {length} exceeds maximum allowed length of {max} bytes")]
	TooLong { length: usize, max: usize },

	#[error("pattern has {count} path segments, exceeding maximum of {max}")]
	TooManySegments { count: usize, max: usize },

	#[error("pattern must start with '/': {0:?}")]
	NotAbsolute(String),

	#[error("unclosed parameter in pattern {0:?}")]
	UnclosedParameter(String),

	#[error("invalid parameter name {0:?}")]
	InvalidParameterName(String),

	#[error("parameter {0:?} appears more than once")]
	DuplicateParameter(String),

	#[error("unknown converter {converter:?} for parameter {name:?}")]
	UnknownConverter { name: String, converter: String },

	#[error("failed to compile pattern regex: {0}")]
	Regex(String),
}

/// Failure to build a URL for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
	#[error("no rule is registered for endpoint {0:?}")]
	UnknownEndpoint(String),

	#[error("could not build url for endpoint {endpoint:?}: missing value for {name:?}")]
	MissingParameter { endpoint: String, name: String },

	#[error("value {value:?} is not valid for parameter {name:?}")]
	InvalidParameter { name: String, value: String },

	#[error("endpoint {endpoint:?} does not accept method {method}")]
	MethodMismatch { endpoint: String, method: String },
}
