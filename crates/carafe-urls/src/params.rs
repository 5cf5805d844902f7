//! Captured path parameters.

use indexmap::IndexMap;
use std::fmt;

/// A single captured value.
///
/// The variant records which converter produced it, so building a URL from
/// the same value reproduces the original segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamValue {
	Str(String),
	Int(i64),
	Path(String),
}

impl ParamValue {
	/// The textual value of a `Str` or `Path` capture
	pub fn as_str(&self) -> Option<&str> {
		match self {
			ParamValue::Str(value) | ParamValue::Path(value) => Some(value),
			ParamValue::Int(_) => None,
		}
	}

	/// The integer value, parsing a `Str` capture if needed
	pub fn as_int(&self) -> Option<i64> {
		match self {
			ParamValue::Int(value) => Some(*value),
			ParamValue::Str(value) => value.parse().ok(),
			ParamValue::Path(_) => None,
		}
	}
}

impl fmt::Display for ParamValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ParamValue::Str(value) | ParamValue::Path(value) => f.write_str(value),
			ParamValue::Int(value) => write!(f, "{value}"),
		}
	}
}

impl From<&str> for ParamValue {
	fn from(value: &str) -> Self {
		ParamValue::Str(value.to_string())
	}
}

impl From<String> for ParamValue {
	fn from(value: String) -> Self {
		ParamValue::Str(value)
	}
}

impl From<i64> for ParamValue {
	fn from(value: i64) -> Self {
		ParamValue::Int(value)
	}
}

impl From<i32> for ParamValue {
	fn from(value: i32) -> Self {
		ParamValue::Int(i64::from(value))
	}
}

/// Named path parameters in capture order.
///
/// # Examples
///
/// ```
/// use carafe_urls::{ParamValue, PathParams};
///
/// let mut params = PathParams::new();
/// params.insert("lang", "en");
/// params.insert("page", 3);
///
/// assert_eq!(params.get_str("lang"), Some("en"));
/// assert_eq!(params.get_int("page"), Some(3));
/// assert_eq!(params.remove("lang"), Some(ParamValue::Str("en".into())));
/// assert_eq!(params.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
	values: IndexMap<String, ParamValue>,
}

impl PathParams {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace a value, returning the previous one
	pub fn insert(
		&mut self,
		name: impl Into<String>,
		value: impl Into<ParamValue>,
	) -> Option<ParamValue> {
		self.values.insert(name.into(), value.into())
	}

	/// Insert a value only if the name is not present yet
	pub fn set_default(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
		self.values.entry(name.into()).or_insert_with(|| value.into());
	}

	pub fn get(&self, name: &str) -> Option<&ParamValue> {
		self.values.get(name)
	}

	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(ParamValue::as_str)
	}

	pub fn get_int(&self, name: &str) -> Option<i64> {
		self.get(name).and_then(ParamValue::as_int)
	}

	/// Remove a value, keeping the order of the remaining ones
	pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
		self.values.shift_remove(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
		self.values.iter().map(|(name, value)| (name.as_str(), value))
	}
}

impl<K, V> FromIterator<(K, V)> for PathParams
where
	K: Into<String>,
	V: Into<ParamValue>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut params = PathParams::new();
		for (name, value) in iter {
			params.insert(name, value);
		}
		params
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_insertion_order_is_kept() {
		let params: PathParams = [("b", "2"), ("a", "1"), ("c", "3")].into_iter().collect();

		let names: Vec<&str> = params.iter().map(|(name, _)| name).collect();
		assert_eq!(names, vec!["b", "a", "c"]);
	}

	#[rstest]
	fn test_set_default_does_not_override() {
		let mut params = PathParams::new();
		params.insert("lang", "de");
		params.set_default("lang", "en");
		params.set_default("page", 1);

		assert_eq!(params.get_str("lang"), Some("de"));
		assert_eq!(params.get_int("page"), Some(1));
	}

	#[rstest]
	#[case(ParamValue::Int(5), Some(5))]
	#[case(ParamValue::Str("12".into()), Some(12))]
	#[case(ParamValue::Str("x".into()), None)]
	#[case(ParamValue::Path("1".into()), None)]
	fn test_as_int(#[case] value: ParamValue, #[case] expected: Option<i64>) {
		assert_eq!(value.as_int(), expected);
	}
}
