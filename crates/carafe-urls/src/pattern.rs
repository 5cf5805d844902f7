//! Rule pattern compilation, matching and building.

use crate::error::{BuildError, PatternError};
use crate::params::{ParamValue, PathParams};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use regex::{Regex, RegexBuilder};

/// Maximum allowed length for a pattern string in bytes.
const MAX_PATTERN_LENGTH: usize = 1024;

/// Maximum allowed number of path segments in a pattern.
const MAX_PATH_SEGMENTS: usize = 32;

/// Maximum allowed size for a compiled pattern regex (in bytes).
const MAX_REGEX_SIZE: usize = 1 << 20; // 1 MiB

/// Characters escaped when a value is placed inside a single segment.
const SEGMENT: &AsciiSet = &CONTROLS
	.add(b' ')
	.add(b'"')
	.add(b'#')
	.add(b'%')
	.add(b'/')
	.add(b'<')
	.add(b'>')
	.add(b'?')
	.add(b'`')
	.add(b'{')
	.add(b'}');

/// Same as [`SEGMENT`] but slashes pass through.
const PATH: &AsciiSet = &CONTROLS
	.add(b' ')
	.add(b'"')
	.add(b'#')
	.add(b'%')
	.add(b'<')
	.add(b'>')
	.add(b'?')
	.add(b'`')
	.add(b'{')
	.add(b'}');

/// How a captured segment is matched and typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
	/// One segment, no slashes
	Default,
	/// Digits only, captured as [`ParamValue::Int`]
	Int,
	/// The rest of the path, slashes included
	Path,
}

impl Converter {
	fn parse(name: &str, converter: &str) -> Result<Self, PatternError> {
		match converter {
			"" | "string" => Ok(Converter::Default),
			"int" => Ok(Converter::Int),
			"path" => Ok(Converter::Path),
			other => Err(PatternError::UnknownConverter {
				name: name.to_string(),
				converter: other.to_string(),
			}),
		}
	}

	fn regex(self) -> &'static str {
		match self {
			Converter::Default => "[^/]+",
			Converter::Int => r"\d+",
			Converter::Path => "[^/].*?",
		}
	}
}

#[derive(Debug, Clone)]
enum Segment {
	Literal(String),
	Param { name: String, converter: Converter },
}

/// A compiled rule pattern such as `/users/{id:int}/posts/{slug}`.
#[derive(Debug, Clone)]
pub struct PathPattern {
	pattern: String,
	regex: Regex,
	segments: Vec<Segment>,
}

impl PathPattern {
	/// Compile a pattern string.
	///
	/// # Errors
	///
	/// Returns [`PatternError`] if the pattern is too long, has too many
	/// segments, does not start with `/`, has a malformed or repeated
	/// parameter, or names an unknown converter.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_urls::PathPattern;
	///
	/// let pattern = PathPattern::new("/files/{name:path}").unwrap();
	/// let params = pattern.matches("/files/a/b.txt").unwrap();
	/// assert_eq!(params.get_str("name"), Some("a/b.txt"));
	/// ```
	pub fn new(pattern: &str) -> Result<Self, PatternError> {
		if pattern.len() > MAX_PATTERN_LENGTH {
			return Err(PatternError::TooLong {
				length: pattern.len(),
				max: MAX_PATTERN_LENGTH,
			});
		}
		let count = pattern.split('/').count();
		if count > MAX_PATH_SEGMENTS {
			return Err(PatternError::TooManySegments {
				count,
				max: MAX_PATH_SEGMENTS,
			});
		}
		if !pattern.starts_with('/') {
			return Err(PatternError::NotAbsolute(pattern.to_string()));
		}

		let segments = Self::parse(pattern)?;
		let mut regex_str = String::from("^");
		for segment in &segments {
			match segment {
				Segment::Literal(text) => regex_str.push_str(&regex::escape(text)),
				Segment::Param { name, converter } => {
					regex_str.push_str(&format!("(?P<{}>{})", name, converter.regex()));
				}
			}
		}
		regex_str.push('$');

		let regex = RegexBuilder::new(&regex_str)
			.size_limit(MAX_REGEX_SIZE)
			.build()
			.map_err(|e| PatternError::Regex(e.to_string()))?;

		Ok(Self {
			pattern: pattern.to_string(),
			regex,
			segments,
		})
	}

	fn parse(pattern: &str) -> Result<Vec<Segment>, PatternError> {
		let mut segments = Vec::new();
		let mut literal = String::new();
		let mut seen: Vec<String> = Vec::new();
		let mut chars = pattern.chars();

		while let Some(c) = chars.next() {
			if c != '{' {
				literal.push(c);
				continue;
			}
			let mut body = String::new();
			let mut closed = false;
			for next in chars.by_ref() {
				if next == '}' {
					closed = true;
					break;
				}
				body.push(next);
			}
			if !closed {
				return Err(PatternError::UnclosedParameter(pattern.to_string()));
			}

			let (name, converter) = body.split_once(':').unwrap_or((body.as_str(), ""));
			let name = name.trim();
			let valid_name = name
				.chars()
				.next()
				.is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
				&& name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
			if !valid_name {
				return Err(PatternError::InvalidParameterName(name.to_string()));
			}
			if seen.iter().any(|existing| existing == name) {
				return Err(PatternError::DuplicateParameter(name.to_string()));
			}
			seen.push(name.to_string());

			if !literal.is_empty() {
				segments.push(Segment::Literal(std::mem::take(&mut literal)));
			}
			segments.push(Segment::Param {
				name: name.to_string(),
				converter: Converter::parse(name, converter.trim())?,
			});
		}
		if !literal.is_empty() {
			segments.push(Segment::Literal(literal));
		}
		Ok(segments)
	}

	/// Returns the original pattern string.
	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	/// Parameter names in the order they appear.
	pub fn param_names(&self) -> impl Iterator<Item = &str> {
		self.segments.iter().filter_map(|segment| match segment {
			Segment::Param { name, .. } => Some(name.as_str()),
			Segment::Literal(_) => None,
		})
	}

	/// Match a request path, returning the captured parameters.
	///
	/// Captured values are percent-decoded. An `int` capture that does not fit
	/// in an `i64` is treated as no match.
	pub fn matches(&self, path: &str) -> Option<PathParams> {
		let caps = self.regex.captures(path)?;
		let mut params = PathParams::new();
		for segment in &self.segments {
			let Segment::Param { name, converter } = segment else {
				continue;
			};
			let raw = caps.name(name)?.as_str();
			let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();
			let value = match converter {
				Converter::Default => ParamValue::Str(decoded),
				Converter::Int => ParamValue::Int(decoded.parse().ok()?),
				Converter::Path => ParamValue::Path(decoded),
			};
			params.insert(name.clone(), value);
		}
		Some(params)
	}

	/// Fill the pattern with values, returning the path and the names used.
	///
	/// # Errors
	///
	/// Returns [`BuildError::MissingParameter`] when a parameter has no value
	/// and [`BuildError::InvalidParameter`] when an `int` parameter is given a
	/// non-integer value.
	pub fn build(
		&self,
		endpoint: &str,
		values: &PathParams,
	) -> Result<(String, Vec<String>), BuildError> {
		let mut path = String::new();
		let mut used = Vec::new();
		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => path.push_str(text),
				Segment::Param { name, converter } => {
					let value = values.get(name).ok_or_else(|| BuildError::MissingParameter {
						endpoint: endpoint.to_string(),
						name: name.clone(),
					})?;
					match converter {
						Converter::Int => {
							let number = value.as_int().ok_or_else(|| {
								BuildError::InvalidParameter {
									name: name.clone(),
									value: value.to_string(),
								}
							})?;
							path.push_str(&number.to_string());
						}
						Converter::Default => {
							path.extend(utf8_percent_encode(&value.to_string(), SEGMENT));
						}
						Converter::Path => {
							path.extend(utf8_percent_encode(&value.to_string(), PATH));
						}
					}
					used.push(name.clone());
				}
			}
		}
		Ok((path, used))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("/users/", "/users/", true)]
	#[case("/users/{id}", "/users/42", true)]
	#[case("/users/{id}", "/users/42/extra", false)]
	#[case("/users/{id:int}", "/users/abc", false)]
	#[case("/static/{file:path}", "/static/css/site.css", true)]
	#[case("/v1.0/items", "/v1x0/items", false)]
	fn test_matches(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
		let pattern = PathPattern::new(pattern).unwrap();
		assert_eq!(pattern.matches(path).is_some(), expected);
	}

	#[rstest]
	fn test_int_capture_is_typed() {
		let pattern = PathPattern::new("/posts/{year:int}/{slug}").unwrap();
		let params = pattern.matches("/posts/2024/hello%20world").unwrap();

		assert_eq!(params.get("year"), Some(&ParamValue::Int(2024)));
		assert_eq!(params.get_str("slug"), Some("hello world"));
	}

	#[rstest]
	fn test_int_overflow_is_no_match() {
		let pattern = PathPattern::new("/n/{value:int}").unwrap();
		assert!(pattern.matches("/n/99999999999999999999999").is_none());
	}

	#[rstest]
	#[case("users", PatternError::NotAbsolute("users".into()))]
	#[case("/users/{id", PatternError::UnclosedParameter("/users/{id".into()))]
	#[case("/a/{1x}", PatternError::InvalidParameterName("1x".into()))]
	#[case("/{a}/{a}", PatternError::DuplicateParameter("a".into()))]
	#[case("/{a:uuid}", PatternError::UnknownConverter { name: "a".into(), converter: "uuid".into() })]
	fn test_invalid_patterns(#[case] pattern: &str, #[case] expected: PatternError) {
		assert_eq!(PathPattern::new(pattern).unwrap_err(), expected);
	}

	#[rstest]
	fn test_too_long_pattern() {
		let pattern = format!("/{}", "a".repeat(MAX_PATTERN_LENGTH));
		assert!(matches!(
			PathPattern::new(&pattern),
			Err(PatternError::TooLong { .. })
		));
	}

	#[rstest]
	fn test_build_encodes_segments() {
		let pattern = PathPattern::new("/search/{term}/{rest:path}").unwrap();
		let values: PathParams = [("term", "a/b c"), ("rest", "x/y")].into_iter().collect();

		let (path, used) = pattern.build("search", &values).unwrap();

		assert_eq!(path, "/search/a%2Fb%20c/x/y");
		assert_eq!(used, vec!["term".to_string(), "rest".to_string()]);
	}

	#[rstest]
	fn test_build_missing_parameter() {
		let pattern = PathPattern::new("/users/{id:int}").unwrap();
		let err = pattern.build("user", &PathParams::new()).unwrap_err();

		assert_eq!(
			err,
			BuildError::MissingParameter {
				endpoint: "user".into(),
				name: "id".into()
			}
		);
	}

	#[rstest]
	fn test_build_rejects_non_integer() {
		let pattern = PathPattern::new("/users/{id:int}").unwrap();
		let values: PathParams = [("id", "abc")].into_iter().collect();

		assert!(matches!(
			pattern.build("user", &values),
			Err(BuildError::InvalidParameter { .. })
		));
	}
}
