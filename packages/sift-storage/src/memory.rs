use std::{collections::HashMap, sync::Mutex};

use crate::{BoxFuture, DurableStore, Error, Result};

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: Mutex<HashMap<String, String>>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<String> {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).get(key).cloned()
	}

	/// Seeds a value without going through the async trait.
	pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).insert(key.into(), value.into());
	}

	pub fn len(&self) -> usize {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl DurableStore for MemoryStore {
	fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		let found = self.entries.lock().unwrap_or_else(|err| err.into_inner()).contains_key(key);

		Box::pin(async move { Ok(found) })
	}

	fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<String>> {
		let value = self.get(key);

		Box::pin(async move { value.ok_or_else(|| Error::NotFound { key: key.to_string() }) })
	}

	fn write<'a>(&'a self, key: &'a str, data: &'a str) -> BoxFuture<'a, Result<()>> {
		let result = crate::validate_key(key).map(|()| self.insert(key, data));

		Box::pin(async move { result })
	}

	fn clear<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).clear();

		Box::pin(async { Ok(()) })
	}
}
