//! Type-keyed storage
//!
//! Used for request extensions, the per-context `g` namespace, session
//! state and application extensions. Clones share the same underlying map.

use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type AnyMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Type-safe extension storage
#[derive(Clone, Default)]
pub struct Extensions {
	map: Arc<Mutex<AnyMap>>,
}

impl Extensions {
	/// Create a new Extensions instance
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Extensions;
	///
	/// let extensions = Extensions::new();
	/// assert!(!extensions.contains::<String>());
	/// ```
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a value, replacing any previous value of the same type
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Extensions;
	///
	/// let extensions = Extensions::new();
	/// extensions.insert(42u32);
	/// extensions.insert("hello".to_string());
	///
	/// assert!(extensions.contains::<u32>());
	/// assert!(extensions.contains::<String>());
	/// ```
	pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
		self.map.lock().insert(TypeId::of::<T>(), Box::new(value));
	}

	/// Get a cloned value
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Extensions;
	///
	/// let extensions = Extensions::new();
	/// extensions.insert(42u32);
	///
	/// assert_eq!(extensions.get::<u32>(), Some(42));
	/// assert_eq!(extensions.get::<String>(), None);
	/// ```
	pub fn get<T>(&self) -> Option<T>
	where
		T: Clone + Send + Sync + 'static,
	{
		self.map
			.lock()
			.get(&TypeId::of::<T>())
			.and_then(|boxed| boxed.downcast_ref::<T>())
			.cloned()
	}

	/// Get a cloned value, initializing it on first access
	///
	/// The initializer runs while the map is locked and must not touch the
	/// same `Extensions`.
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Extensions;
	///
	/// let extensions = Extensions::new();
	/// assert_eq!(extensions.get_or_insert_with(|| 7u8), 7);
	/// assert_eq!(extensions.get_or_insert_with(|| 9u8), 7);
	/// ```
	pub fn get_or_insert_with<T, F>(&self, init: F) -> T
	where
		T: Clone + Send + Sync + 'static,
		F: FnOnce() -> T,
	{
		let mut map = self.map.lock();
		if let Some(value) = map
			.get(&TypeId::of::<T>())
			.and_then(|boxed| boxed.downcast_ref::<T>())
		{
			return value.clone();
		}
		let value = init();
		map.insert(TypeId::of::<T>(), Box::new(value.clone()));
		value
	}

	/// Check if a value of the given type exists
	pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
		self.map.lock().contains_key(&TypeId::of::<T>())
	}

	/// Remove a value and return it
	///
	/// # Examples
	///
	/// ```
	/// use carafe_http::Extensions;
	///
	/// let extensions = Extensions::new();
	/// extensions.insert(42u32);
	///
	/// assert_eq!(extensions.remove::<u32>(), Some(42));
	/// assert_eq!(extensions.remove::<u32>(), None);
	/// ```
	pub fn remove<T>(&self) -> Option<T>
	where
		T: Send + Sync + 'static,
	{
		let mut map = self.map.lock();
		let boxed = map.remove(&TypeId::of::<T>())?;
		match boxed.downcast::<T>() {
			Ok(value) => Some(*value),
			Err(boxed) => {
				map.insert(TypeId::of::<T>(), boxed);
				None
			}
		}
	}

	pub fn len(&self) -> usize {
		self.map.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.map.lock().is_empty()
	}

	pub fn clear(&self) {
		self.map.lock().clear();
	}
}

impl fmt::Debug for Extensions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Extensions")
			.field("len", &self.len())
			.finish()
	}
}
