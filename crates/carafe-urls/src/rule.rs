use crate::error::PatternError;
use crate::pattern::PathPattern;
use http::Method;

/// One URL rule: a pattern bound to an endpoint name and a method set.
///
/// Without an explicit method list a rule accepts `GET`. `HEAD` is implied
/// by `GET`, and `OPTIONS` is added automatically unless the rule opts out
/// or lists it explicitly.
///
/// # Examples
///
/// ```
/// use carafe_urls::Rule;
/// use http::Method;
///
/// let rule = Rule::new("/items/", "items")
///     .unwrap()
///     .methods([Method::GET, Method::POST]);
///
/// assert_eq!(
///     rule.allowed_methods(),
///     vec![Method::GET, Method::POST, Method::HEAD, Method::OPTIONS]
/// );
/// assert!(rule.provides_automatic_options());
/// ```
#[derive(Debug, Clone)]
pub struct Rule {
	pattern: PathPattern,
	endpoint: String,
	methods: Option<Vec<Method>>,
	strict_slashes: bool,
	automatic_options: bool,
}

impl Rule {
	/// # Errors
	///
	/// Returns [`PatternError`] if the pattern does not compile.
	pub fn new(pattern: &str, endpoint: impl Into<String>) -> Result<Self, PatternError> {
		Ok(Self {
			pattern: PathPattern::new(pattern)?,
			endpoint: endpoint.into(),
			methods: None,
			strict_slashes: true,
			automatic_options: true,
		})
	}

	/// Restrict the rule to the given methods
	pub fn methods<I>(mut self, methods: I) -> Self
	where
		I: IntoIterator<Item = Method>,
	{
		self.methods = Some(methods.into_iter().collect());
		self
	}

	/// Whether a request without the trailing slash is redirected (default `true`)
	pub fn strict_slashes(mut self, strict: bool) -> Self {
		self.strict_slashes = strict;
		self
	}

	/// Whether `OPTIONS` is answered automatically (default `true`)
	pub fn provide_automatic_options(mut self, provide: bool) -> Self {
		self.automatic_options = provide;
		self
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn pattern(&self) -> &PathPattern {
		&self.pattern
	}

	/// The rule string as registered
	pub fn rule(&self) -> &str {
		self.pattern.pattern()
	}

	pub fn is_strict_slashes(&self) -> bool {
		self.strict_slashes
	}

	/// True if `OPTIONS` requests are answered by the framework rather than
	/// the view.
	pub fn provides_automatic_options(&self) -> bool {
		self.automatic_options
			&& !self
				.methods
				.as_ref()
				.is_some_and(|methods| methods.contains(&Method::OPTIONS))
	}

	/// Every method the rule accepts, in a stable order.
	pub fn allowed_methods(&self) -> Vec<Method> {
		let mut allowed = self
			.methods
			.clone()
			.unwrap_or_else(|| vec![Method::GET]);
		if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
			allowed.push(Method::HEAD);
		}
		if self.automatic_options && !allowed.contains(&Method::OPTIONS) {
			allowed.push(Method::OPTIONS);
		}
		allowed
	}

	pub fn accepts(&self, method: &Method) -> bool {
		self.allowed_methods().contains(method)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_default_methods() {
		let rule = Rule::new("/", "index").unwrap();

		assert_eq!(
			rule.allowed_methods(),
			vec![Method::GET, Method::HEAD, Method::OPTIONS]
		);
		assert!(!rule.accepts(&Method::POST));
	}

	#[rstest]
	fn test_explicit_options_disables_automatic() {
		let rule = Rule::new("/", "index")
			.unwrap()
			.methods([Method::GET, Method::OPTIONS]);

		assert!(!rule.provides_automatic_options());
		assert!(rule.accepts(&Method::OPTIONS));
	}

	#[rstest]
	fn test_opt_out_of_automatic_options() {
		let rule = Rule::new("/", "index")
			.unwrap()
			.provide_automatic_options(false);

		assert!(!rule.accepts(&Method::OPTIONS));
	}
}
