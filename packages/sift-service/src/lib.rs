//! Keeps a [`SearchIndexEngine`] in step with a remote metadata source: bulk rebuilds, incremental
//! change-feed syncs, and debounced persistence of usage counters.

pub mod cursor;
pub mod rebuild;
pub mod sync;
pub mod usage;

mod error;
mod schedule;

pub use cursor::{ChangeTracking, CursorMode};
pub use error::{Error, Result};
pub use rebuild::{RebuildJob, RebuildReport};
pub use sync::{SyncCoordinator, SyncFailure, SyncReport};
pub use usage::UsageFlusher;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use sift_config::Config;
use sift_domain::{ChangeCursor, ChangesPage, ListPage};
use sift_index::{IndexStats, RecordFilter, SearchHit, SearchIndexEngine};
use sift_providers::HttpSource;
use sift_storage::DurableStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The remote side of the index: a paginated listing plus a cursor-based change feed.
pub trait SourceConnector
where
	Self: Send + Sync,
{
	/// `Ok(false)` means the credentials were rejected.
	fn authenticate<'a>(&'a self) -> BoxFuture<'a, Result<bool>>;

	fn is_authenticated(&self) -> bool;

	fn list_page<'a>(&'a self, cursor: Option<&'a str>) -> BoxFuture<'a, Result<ListPage>>;

	fn changes_page<'a>(&'a self, cursor: &'a str) -> BoxFuture<'a, Result<ChangesPage>>;

	/// A cursor positioned at the current head of the change feed.
	fn fresh_cursor<'a>(&'a self) -> BoxFuture<'a, Result<ChangeCursor>>;
}

impl SourceConnector for HttpSource {
	fn authenticate<'a>(&'a self) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(HttpSource::authenticate(self).await?) })
	}

	fn is_authenticated(&self) -> bool {
		HttpSource::is_authenticated(self)
	}

	fn list_page<'a>(&'a self, cursor: Option<&'a str>) -> BoxFuture<'a, Result<ListPage>> {
		Box::pin(async move { Ok(HttpSource::list_page(self, cursor).await?) })
	}

	fn changes_page<'a>(&'a self, cursor: &'a str) -> BoxFuture<'a, Result<ChangesPage>> {
		Box::pin(async move { Ok(HttpSource::changes_page(self, cursor).await?) })
	}

	fn fresh_cursor<'a>(&'a self) -> BoxFuture<'a, Result<ChangeCursor>> {
		Box::pin(async move { Ok(HttpSource::start_cursor(self).await?) })
	}
}

/// Every component wired against one engine, one store and one source.
pub struct SiftService {
	pub engine: Arc<SearchIndexEngine>,
	pub source: Arc<dyn SourceConnector>,
	pub store: Arc<dyn DurableStore>,
	pub rebuild: RebuildJob,
	pub sync: Arc<SyncCoordinator>,
	pub usage: UsageFlusher,
	sync_interval: Duration,
}
impl SiftService {
	pub fn new(
		cfg: &Config,
		store: Arc<dyn DurableStore>,
		source: Arc<dyn SourceConnector>,
	) -> Self {
		let engine =
			Arc::new(SearchIndexEngine::new(store.clone(), cfg.index.clone(), cfg.usage.clone()));
		let tracking = ChangeTracking::new(store.clone(), source.clone());
		let rebuild =
			RebuildJob::new(engine.clone(), source.clone(), tracking.clone(), cfg.rebuild.clone());
		let sync = Arc::new(SyncCoordinator::new(engine.clone(), source.clone(), tracking));
		let usage = UsageFlusher::new(engine.clone(), &cfg.usage);

		Self {
			engine,
			source,
			store,
			rebuild,
			sync,
			usage,
			sync_interval: Duration::from_millis(cfg.sync.interval_ms),
		}
	}

	pub async fn initialize(&self) -> IndexStats {
		self.engine.initialize().await
	}

	pub fn search(&self, query: &str, limit: usize, filter: Option<&RecordFilter>) -> Vec<SearchHit> {
		self.engine.search(query, limit, filter)
	}

	/// Counts an open of `id` and flushes right away when enough mutations are pending.
	pub async fn track_usage(&self, id: &str) -> bool {
		if !self.engine.track_usage(id) {
			return false;
		}

		self.usage.flush_if_due().await;

		true
	}

	pub async fn full_rebuild(&self, force: bool) -> Result<RebuildReport> {
		self.rebuild.full_rebuild(force).await
	}

	pub async fn sync_once(&self) -> SyncReport {
		self.sync.sync_once().await
	}

	/// Starts periodic sync and usage flushing.
	pub fn start_background(&self) {
		self.sync.start_periodic_sync(self.sync_interval);
		self.usage.start();
	}

	/// Stops background work, waits for in-flight maintenance, then persists pending usage.
	pub async fn shutdown(&self) -> Result<()> {
		self.sync.stop_periodic_sync();
		self.usage.stop();

		let _maintenance = self.engine.maintenance().await;

		if self.engine.stats().pending_usage > 0 {
			self.engine.flush().await?;
		}

		tracing::info!("Sift service stopped.");

		Ok(())
	}
}
