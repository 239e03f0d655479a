use std::sync::Arc;

use crate::{Result, SourceConnector};
use sift_domain::ChangeCursor;
use sift_storage::{CURSOR_KEY, DurableStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorMode {
	/// Keep a persisted cursor; fetch and persist a fresh one only when none exists.
	IfAbsent,
	/// Always replace the persisted cursor with a fresh one.
	Reset,
}

/// Owns the single persisted change cursor.
#[derive(Clone)]
pub struct ChangeTracking {
	store: Arc<dyn DurableStore>,
	source: Arc<dyn SourceConnector>,
}
impl ChangeTracking {
	pub fn new(store: Arc<dyn DurableStore>, source: Arc<dyn SourceConnector>) -> Self {
		Self { store, source }
	}

	/// The persisted cursor. A blank value counts as absent.
	pub async fn load(&self) -> Result<Option<ChangeCursor>> {
		if !self.store.exists(CURSOR_KEY).await? {
			return Ok(None);
		}

		let raw = self.store.read(CURSOR_KEY).await?;
		let token = raw.trim();

		if token.is_empty() {
			tracing::warn!("Persisted change cursor is blank; treating it as absent.");

			return Ok(None);
		}

		Ok(Some(ChangeCursor::new(token)))
	}

	pub async fn save(&self, cursor: &ChangeCursor) -> Result<()> {
		self.store.write(CURSOR_KEY, cursor.as_str()).await?;

		tracing::debug!(%cursor, "Change cursor persisted.");

		Ok(())
	}

	/// Makes sure a cursor is persisted and returns it.
	///
	/// Repeating a call with [`CursorMode::IfAbsent`] never talks to the source once a cursor
	/// exists.
	pub async fn ensure_cursor(&self, mode: CursorMode) -> Result<ChangeCursor> {
		if mode == CursorMode::IfAbsent
			&& let Some(cursor) = self.load().await?
		{
			return Ok(cursor);
		}

		let cursor = self.source.fresh_cursor().await?;

		self.save(&cursor).await?;

		tracing::info!(%cursor, ?mode, "Change tracking initialized.");

		Ok(cursor)
	}
}
