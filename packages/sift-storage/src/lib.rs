pub mod file;
pub mod memory;

mod error;

pub use error::Error;
pub use file::FileStore;
pub use memory::MemoryStore;

use std::{future::Future, pin::Pin};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Serialized searchable projections of every indexed record.
pub const INDEX_KEY: &str = "index";
/// Serialized metadata records keyed by id.
pub const METADATA_KEY: &str = "metadata";
/// The change cursor the index has caught up to.
pub const CURSOR_KEY: &str = "cursor";

/// Key-value persistence used for the index snapshot, the metadata snapshot and the change cursor.
///
/// Writes to different keys are independent; there is no transaction spanning keys.
pub trait DurableStore
where
	Self: Send + Sync,
{
	fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

	/// Fails with [`Error::NotFound`] when `key` was never written.
	fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<String>>;

	fn write<'a>(&'a self, key: &'a str, data: &'a str) -> BoxFuture<'a, Result<()>>;

	fn clear<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(async { Err(Error::Unsupported { operation: "clear" }) })
	}
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
	let valid = !key.is_empty()
		&& key.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'));

	if !valid {
		return Err(Error::InvalidKey { key: key.to_string() });
	}

	Ok(())
}
