use std::{
	io::ErrorKind,
	path::{Path, PathBuf},
};

use tokio::{fs, io::AsyncWriteExt};

use crate::{BoxFuture, DurableStore, Error, Result};

const EXTENSION: &str = "json";

/// Stores every key as `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling that is flushed to disk before being renamed into place, so a
/// reader never observes a half-written or empty value for a single key.
#[derive(Clone, Debug)]
pub struct FileStore {
	dir: PathBuf,
}
impl FileStore {
	pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
		let dir = dir.into();

		fs::create_dir_all(&dir)
			.await
			.map_err(|err| Error::Io { key: dir.display().to_string(), source: err })?;

		Ok(Self { dir })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn path_for(&self, key: &str) -> Result<PathBuf> {
		crate::validate_key(key)?;

		Ok(self.dir.join(format!("{key}.{EXTENSION}")))
	}

	async fn read_key(&self, key: &str) -> Result<String> {
		let path = self.path_for(key)?;

		match fs::read_to_string(&path).await {
			Ok(raw) => Ok(raw),
			Err(err) if err.kind() == ErrorKind::NotFound =>
				Err(Error::NotFound { key: key.to_string() }),
			Err(err) => Err(Error::Io { key: key.to_string(), source: err }),
		}
	}

	async fn write_key(&self, key: &str, data: &str) -> Result<()> {
		let path = self.path_for(key)?;
		let tmp = self.dir.join(format!("{key}.{EXTENSION}.tmp"));
		let io_err = |err| Error::Io { key: key.to_string(), source: err };
		let mut file = fs::File::create(&tmp).await.map_err(io_err)?;

		file.write_all(data.as_bytes()).await.map_err(io_err)?;
		file.sync_all().await.map_err(io_err)?;

		drop(file);

		fs::rename(&tmp, &path).await.map_err(io_err)?;

		tracing::trace!(key, bytes = data.len(), "Store value written.");

		Ok(())
	}

	async fn clear_all(&self) -> Result<()> {
		let io_err = |err| Error::Io { key: self.dir.display().to_string(), source: err };
		let mut entries = fs::read_dir(&self.dir).await.map_err(io_err)?;

		while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
			let path = entry.path();
			let is_store_file = path
				.file_name()
				.and_then(|name| name.to_str())
				.map(|name| name.ends_with(".json") || name.ends_with(".json.tmp"))
				.unwrap_or(false);

			if is_store_file {
				fs::remove_file(&path).await.map_err(io_err)?;
			}
		}

		Ok(())
	}
}
impl DurableStore for FileStore {
	fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let path = self.path_for(key)?;

			fs::try_exists(&path).await.map_err(|err| Error::Io { key: key.to_string(), source: err })
		})
	}

	fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(self.read_key(key))
	}

	fn write<'a>(&'a self, key: &'a str, data: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.write_key(key, data))
	}

	fn clear<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.clear_all())
	}
}
