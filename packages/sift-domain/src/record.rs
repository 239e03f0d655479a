use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::category::{self, CategoryFamily};

/// File metadata harvested from the source. Keyed by `id`, which is stable and unique per source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
	pub id: String,
	pub name: String,
	/// Source category, usually a MIME type.
	pub category: String,
	/// Slash-separated folder path within the source, when the source exposes one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub modified_at: OffsetDateTime,
	#[serde(default)]
	pub size: u64,
	#[serde(default)]
	pub open_count: u64,
	#[serde(default, with = "crate::time_serde::option")]
	pub last_opened_at: Option<OffsetDateTime>,
}
impl MetadataRecord {
	pub fn new(
		id: impl Into<String>,
		name: impl Into<String>,
		category: impl Into<String>,
		modified_at: OffsetDateTime,
	) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			category: category.into(),
			path: None,
			modified_at,
			size: 0,
			open_count: 0,
			last_opened_at: None,
		}
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());

		self
	}

	pub fn with_size(mut self, size: u64) -> Self {
		self.size = size;

		self
	}

	pub fn family(&self) -> CategoryFamily {
		category::family_of(&self.category)
	}

	pub fn is_folder(&self) -> bool {
		self.family() == CategoryFamily::Folder
	}

	/// Age of the last modification in fractional days, clamped at zero for future timestamps.
	pub fn age_days(&self, now: OffsetDateTime) -> f64 {
		let seconds = (now - self.modified_at).as_seconds_f64();

		(seconds / 86_400.0).max(0.0)
	}
}

/// Opaque position in the source change feed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeCursor(String);
impl ChangeCursor {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}
impl std::fmt::Display for ChangeCursor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// One entry from the change feed. A removal or an entry without a payload deletes `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
	pub id: String,
	#[serde(default)]
	pub removed: bool,
	#[serde(default)]
	pub record: Option<MetadataRecord>,
}
impl ChangeEntry {
	pub fn upsert(record: MetadataRecord) -> Self {
		Self { id: record.id.clone(), removed: false, record: Some(record) }
	}

	pub fn removal(id: impl Into<String>) -> Self {
		Self { id: id.into(), removed: true, record: None }
	}

	pub fn is_removal(&self) -> bool {
		self.removed || self.record.is_none()
	}

	/// Folder entries are not indexed; removals are always kept so stale ids are dropped.
	pub fn is_indexable(&self) -> bool {
		if self.is_removal() {
			return true;
		}

		!self.record.as_ref().map(MetadataRecord::is_folder).unwrap_or(false)
	}
}

/// One page of the full listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
	pub records: Vec<MetadataRecord>,
	#[serde(default)]
	pub next_cursor: Option<String>,
}

/// One page of the change feed.
///
/// `terminal_cursor` marks the caller as caught up. `next_page_cursor` continues pagination.
/// A page carrying neither ends pagination without a new cursor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangesPage {
	pub changes: Vec<ChangeEntry>,
	#[serde(default)]
	pub next_page_cursor: Option<String>,
	#[serde(default)]
	pub terminal_cursor: Option<ChangeCursor>,
}
