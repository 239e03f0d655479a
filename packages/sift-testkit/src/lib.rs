//! Scriptable fakes for exercising the index, rebuild and sync paths without a network.

use std::{
	collections::{HashMap, HashSet},
	path::PathBuf,
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};

use serde_json::Map;
use time::{Duration, OffsetDateTime, macros::datetime};
use tokio::sync::Notify;

use sift_domain::{ChangeCursor, ChangesPage, ListPage, MetadataRecord};
use sift_service::{BoxFuture, Error, Result, SourceConnector};
use sift_storage::{
	BoxFuture as StoreFuture, DurableStore, Error as StoreError, MemoryStore,
	Result as StoreResult,
};

pub const FOLDER_CATEGORY: &str = "application/vnd.google-apps.folder";

/// Fixed "now" the record helpers are relative to.
pub const BASE_TIME: OffsetDateTime = datetime!(2026-09-01 9:00 UTC);

pub fn record(id: &str, name: &str, category: &str) -> MetadataRecord {
	MetadataRecord::new(id, name, category, BASE_TIME)
}

pub fn record_aged(id: &str, name: &str, category: &str, age_days: i64) -> MetadataRecord {
	MetadataRecord::new(id, name, category, BASE_TIME - Duration::days(age_days))
}

pub fn folder(id: &str, name: &str) -> MetadataRecord {
	MetadataRecord::new(id, name, FOLDER_CATEGORY, BASE_TIME)
}

/// `count` plain-text records named `doc-<n>.txt` with ids `<prefix>-<n>`.
pub fn records(prefix: &str, count: usize) -> Vec<MetadataRecord> {
	(0..count).map(|n| record(&format!("{prefix}-{n}"), &format!("doc-{n}.txt"), "text/plain")).collect()
}

/// Rebuild settings without pacing delays.
pub fn rebuild_config() -> sift_config::Rebuild {
	sift_config::Rebuild { page_delay_ms: 0, batch_delay_ms: 0, ..Default::default() }
}

/// A complete configuration pointing at an unreachable source, with rebuild pacing disabled.
pub fn service_config() -> sift_config::Config {
	sift_config::Config {
		service: sift_config::Service { log_level: "info".to_string() },
		storage: sift_config::Storage { dir: PathBuf::from("sift-test-data") },
		source: sift_config::Source {
			api_base: "http://source.invalid".to_string(),
			access_token: "test-token".to_string(),
			auth_check_path: "/v1/account".to_string(),
			list_path: "/v1/files".to_string(),
			changes_path: "/v1/changes".to_string(),
			start_cursor_path: "/v1/changes/start-cursor".to_string(),
			page_size: 100,
			timeout_ms: 1_000,
			default_headers: Map::new(),
		},
		index: Default::default(),
		rebuild: rebuild_config(),
		sync: Default::default(),
		usage: Default::default(),
	}
}

#[derive(Debug, Default)]
pub struct CallCounts {
	pub authenticate: usize,
	pub list: usize,
	pub changes: usize,
	pub fresh_cursor: usize,
}

#[derive(Default)]
struct Script {
	list_pages: Vec<Vec<MetadataRecord>>,
	/// Remaining injected failures per listing page index.
	list_failures: HashMap<usize, usize>,
	list_always_fails: bool,
	changes: HashMap<String, ChangesPage>,
	changes_fail: bool,
	fresh_fails: bool,
	counts: CallCounts,
}

/// In-memory [`SourceConnector`].
///
/// Listing pages are addressed by cursors `list-<n>`. Change pages are keyed by the cursor they
/// answer; an unscripted cursor answers an empty page that is already caught up. Fresh cursors
/// are `fresh-1`, `fresh-2`, and so on.
pub struct FakeSource {
	script: Mutex<Script>,
	authenticated: AtomicBool,
	accepts_credentials: AtomicBool,
	fresh_counter: AtomicUsize,
	changes_gate: Mutex<Option<Arc<Notify>>>,
	changes_entered: Notify,
}
impl FakeSource {
	/// An authenticated source with an empty listing.
	pub fn new() -> Self {
		Self {
			script: Mutex::new(Script::default()),
			authenticated: AtomicBool::new(true),
			accepts_credentials: AtomicBool::new(true),
			fresh_counter: AtomicUsize::new(0),
			changes_gate: Mutex::new(None),
			changes_entered: Notify::new(),
		}
	}

	/// Splits `records` into listing pages of `page_size`.
	pub fn with_listing(self, records: Vec<MetadataRecord>, page_size: usize) -> Self {
		let pages = records.chunks(page_size.max(1)).map(<[MetadataRecord]>::to_vec).collect();

		self.lock().list_pages = pages;

		self
	}

	/// Sets the listing page by page.
	pub fn with_pages(self, pages: Vec<Vec<MetadataRecord>>) -> Self {
		self.lock().list_pages = pages;

		self
	}

	pub fn set_authenticated(&self, authenticated: bool) {
		self.authenticated.store(authenticated, Ordering::SeqCst);
	}

	/// Whether `authenticate()` succeeds.
	pub fn set_accepts_credentials(&self, accepts: bool) {
		self.accepts_credentials.store(accepts, Ordering::SeqCst);
	}

	/// The next `times` fetches of listing page `index` fail.
	pub fn fail_list_page(&self, index: usize, times: usize) {
		self.lock().list_failures.insert(index, times);
	}

	pub fn fail_listing_always(&self, fail: bool) {
		self.lock().list_always_fails = fail;
	}

	/// Scripts the answer to `changes_page(cursor)`.
	pub fn script_changes(&self, cursor: &str, page: ChangesPage) {
		self.lock().changes.insert(cursor.to_string(), page);
	}

	pub fn fail_changes(&self, fail: bool) {
		self.lock().changes_fail = fail;
	}

	pub fn fail_fresh_cursor(&self, fail: bool) {
		self.lock().fresh_fails = fail;
	}

	/// Holds every subsequent `changes_page` call until the returned handle is notified.
	pub fn gate_changes(&self) -> Arc<Notify> {
		let gate = Arc::new(Notify::new());

		*self.changes_gate.lock().unwrap_or_else(|err| err.into_inner()) = Some(gate.clone());

		gate
	}

	/// Resolves once a `changes_page` call has started.
	pub async fn changes_entered(&self) {
		self.changes_entered.notified().await;
	}

	pub fn counts(&self) -> CallCounts {
		let script = self.lock();
		let counts = &script.counts;

		CallCounts {
			authenticate: counts.authenticate,
			list: counts.list,
			changes: counts.changes,
			fresh_cursor: counts.fresh_cursor,
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
		self.script.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn answer_list(&self, cursor: Option<&str>) -> Result<ListPage> {
		let mut script = self.lock();

		script.counts.list += 1;

		let index = match cursor {
			None => 0,
			Some(cursor) => cursor
				.strip_prefix("list-")
				.and_then(|n| n.parse::<usize>().ok())
				.ok_or_else(|| Error::Source { message: format!("unknown listing cursor {cursor:?}") })?,
		};

		if script.list_always_fails {
			return Err(Error::Source { message: format!("listing page {index} unavailable") });
		}
		if let Some(remaining) = script.list_failures.get_mut(&index)
			&& *remaining > 0
		{
			*remaining -= 1;

			return Err(Error::Source { message: format!("listing page {index} timed out") });
		}

		let total = script.list_pages.len();
		let records = script.list_pages.get(index).cloned().unwrap_or_default();
		let next_cursor = (index + 1 < total).then(|| format!("list-{}", index + 1));

		Ok(ListPage { records, next_cursor })
	}

	fn answer_changes(&self, cursor: &str) -> Result<ChangesPage> {
		let mut script = self.lock();

		script.counts.changes += 1;

		if script.changes_fail {
			return Err(Error::Source { message: "change feed unavailable".to_string() });
		}

		Ok(script.changes.get(cursor).cloned().unwrap_or_else(|| ChangesPage {
			terminal_cursor: Some(ChangeCursor::new(cursor)),
			..ChangesPage::default()
		}))
	}
}
impl Default for FakeSource {
	fn default() -> Self {
		Self::new()
	}
}
impl SourceConnector for FakeSource {
	fn authenticate<'a>(&'a self) -> BoxFuture<'a, Result<bool>> {
		self.lock().counts.authenticate += 1;

		let accepted = self.accepts_credentials.load(Ordering::SeqCst);

		self.authenticated.store(accepted, Ordering::SeqCst);

		Box::pin(async move { Ok(accepted) })
	}

	fn is_authenticated(&self) -> bool {
		self.authenticated.load(Ordering::SeqCst)
	}

	fn list_page<'a>(&'a self, cursor: Option<&'a str>) -> BoxFuture<'a, Result<ListPage>> {
		Box::pin(async move { self.answer_list(cursor) })
	}

	fn changes_page<'a>(&'a self, cursor: &'a str) -> BoxFuture<'a, Result<ChangesPage>> {
		Box::pin(async move {
			self.changes_entered.notify_one();

			let gate = self.changes_gate.lock().unwrap_or_else(|err| err.into_inner()).clone();

			if let Some(gate) = gate {
				gate.notified().await;
			}

			self.answer_changes(cursor)
		})
	}

	fn fresh_cursor<'a>(&'a self) -> BoxFuture<'a, Result<ChangeCursor>> {
		Box::pin(async move {
			let fails = {
				let mut script = self.lock();

				script.counts.fresh_cursor += 1;

				script.fresh_fails
			};

			if fails {
				return Err(Error::Source { message: "start cursor unavailable".to_string() });
			}

			let n = self.fresh_counter.fetch_add(1, Ordering::SeqCst) + 1;

			Ok(ChangeCursor::new(format!("fresh-{n}")))
		})
	}
}

/// [`MemoryStore`] whose writes to chosen keys fail, with a per-key write counter.
#[derive(Default)]
pub struct FlakyStore {
	inner: MemoryStore,
	failing: Mutex<HashSet<String>>,
	writes: Mutex<HashMap<String, usize>>,
}
impl FlakyStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail_writes(&self, key: &str, fail: bool) {
		let mut failing = self.failing.lock().unwrap_or_else(|err| err.into_inner());

		if fail {
			failing.insert(key.to_string());
		} else {
			failing.remove(key);
		}
	}

	/// Successful writes to `key` so far.
	pub fn writes(&self, key: &str) -> usize {
		self.writes.lock().unwrap_or_else(|err| err.into_inner()).get(key).copied().unwrap_or(0)
	}

	pub fn get(&self, key: &str) -> Option<String> {
		self.inner.get(key)
	}

	pub fn insert(&self, key: &str, value: &str) {
		self.inner.insert(key, value);
	}
}
impl DurableStore for FlakyStore {
	fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, StoreResult<bool>> {
		self.inner.exists(key)
	}

	fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, StoreResult<String>> {
		self.inner.read(key)
	}

	fn write<'a>(&'a self, key: &'a str, data: &'a str) -> StoreFuture<'a, StoreResult<()>> {
		if self.failing.lock().unwrap_or_else(|err| err.into_inner()).contains(key) {
			return Box::pin(async move {
				Err(StoreError::Message(format!("injected write failure for {key}")))
			});
		}

		*self.writes.lock().unwrap_or_else(|err| err.into_inner()).entry(key.to_string()).or_insert(0) +=
			1;

		self.inner.write(key, data)
	}

	fn clear<'a>(&'a self) -> StoreFuture<'a, StoreResult<()>> {
		self.inner.clear()
	}
}
