use carafe_conf::SourceError;
use carafe_http::ContractViolation;
use carafe_urls::PatternError;
use thiserror::Error;

/// Errors raised while an application is being set up.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SetupError {
	/// Registries are frozen once the first request has been handled.
	#[error(
		"the setup method {method:?} can no longer be called on the application; it has already handled its first request"
	)]
	AlreadyServing { method: &'static str },

	#[error("view function mapping is overwriting an existing endpoint function: {0}")]
	DuplicateEndpoint(String),

	#[error("{0} is not a recognized HTTP error code")]
	InvalidErrorCode(u16),

	#[error(transparent)]
	Pattern(#[from] PatternError),

	#[error(transparent)]
	Contract(#[from] ContractViolation),

	#[error(transparent)]
	Config(#[from] SourceError),
}
