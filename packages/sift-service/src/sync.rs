use std::{
	fmt,
	sync::{
		Arc, Mutex, Weak,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use serde::Serialize;
use tokio::time::Instant;

use crate::{
	Error, SourceConnector,
	cursor::{ChangeTracking, CursorMode},
	schedule::Schedule,
};
use sift_domain::{ChangeCursor, ChangeEntry};
use sift_index::SearchIndexEngine;

/// Why a sync pass did not complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SyncFailure {
	AlreadyInProgress,
	NotAuthenticated,
	Source(String),
	Store(String),
}
impl SyncFailure {
	fn from_error(err: &Error) -> Self {
		match err {
			Error::Authentication => Self::NotAuthenticated,
			Error::Storage(inner) => Self::Store(inner.to_string()),
			Error::Index(inner) => Self::Store(inner.to_string()),
			other => Self::Source(other.to_string()),
		}
	}
}
impl fmt::Display for SyncFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::AlreadyInProgress => write!(f, "A sync is already in progress."),
			Self::NotAuthenticated => write!(f, "Source is not authenticated."),
			Self::Source(message) => write!(f, "Source error: {message}"),
			Self::Store(message) => write!(f, "Store error: {message}"),
		}
	}
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SyncReport {
	pub success: bool,
	pub changes_applied: usize,
	pub elapsed_ms: u64,
	/// The pass had no cursor yet and only established one.
	pub bootstrapped: bool,
	pub failure: Option<SyncFailure>,
	/// Non-fatal problems, such as a snapshot write that failed after the changes were applied.
	pub errors: Vec<String>,
}
impl SyncReport {
	fn failed(failure: SyncFailure, started: Instant) -> Self {
		Self { elapsed_ms: elapsed_ms(started), failure: Some(failure), ..Self::default() }
	}
}

/// Clears the in-progress flag when the pass ends, however it ends.
struct InProgress<'a>(&'a AtomicBool);
impl<'a> InProgress<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).ok()?;

		Some(Self(flag))
	}
}
impl Drop for InProgress<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

/// Incremental catch-up from the persisted change cursor.
pub struct SyncCoordinator {
	engine: Arc<SearchIndexEngine>,
	source: Arc<dyn SourceConnector>,
	tracking: ChangeTracking,
	in_progress: AtomicBool,
	schedule: Mutex<Option<Schedule>>,
}
impl SyncCoordinator {
	pub fn new(
		engine: Arc<SearchIndexEngine>,
		source: Arc<dyn SourceConnector>,
		tracking: ChangeTracking,
	) -> Self {
		Self {
			engine,
			source,
			tracking,
			in_progress: AtomicBool::new(false),
			schedule: Mutex::new(None),
		}
	}

	pub fn is_syncing(&self) -> bool {
		self.in_progress.load(Ordering::SeqCst)
	}

	/// Runs one pass. Never panics on source or store trouble; the outcome is in the report.
	pub async fn sync_once(&self) -> SyncReport {
		let started = Instant::now();
		let Some(_in_progress) = InProgress::acquire(&self.in_progress) else {
			tracing::debug!("Sync requested while another pass is running.");

			return SyncReport::failed(SyncFailure::AlreadyInProgress, started);
		};

		if !self.source.is_authenticated() {
			tracing::warn!("Sync skipped because the source is not authenticated.");

			return SyncReport::failed(SyncFailure::NotAuthenticated, started);
		}

		let _maintenance = self.engine.maintenance().await;
		let cursor = match self.tracking.load().await {
			Ok(cursor) => cursor,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to read the change cursor.");

				return SyncReport::failed(SyncFailure::from_error(&err), started);
			},
		};
		let Some(cursor) = cursor else {
			return match self.tracking.ensure_cursor(CursorMode::IfAbsent).await {
				Ok(_) => SyncReport {
					success: true,
					bootstrapped: true,
					elapsed_ms: elapsed_ms(started),
					..SyncReport::default()
				},
				Err(err) => {
					tracing::warn!(error = %err, "Change tracking bootstrap failed.");

					SyncReport::failed(SyncFailure::from_error(&err), started)
				},
			};
		};
		let (changes, next_cursor) = match self.collect_changes(&cursor).await {
			Ok(collected) => collected,
			Err(err) => {
				tracing::warn!(error = %err, %cursor, "Change feed fetch failed; nothing applied.");

				return SyncReport::failed(SyncFailure::from_error(&err), started);
			},
		};
		let mut report = SyncReport::default();
		let mutation = self.engine.apply_changes(changes).await;

		report.changes_applied = mutation.applied();

		if !mutation.rejected.is_empty() {
			report.errors.push(format!("Rejected changes: {}", mutation.rejected.join(", ")));
		}
		if let Some(err) = mutation.persist_error {
			tracing::warn!(error = %err, "Snapshot write failed; cursor kept for replay.");

			report.errors.push(format!("Snapshot write failed: {err}"));
			report.failure = Some(SyncFailure::Store(err.to_string()));
		}

		match next_cursor {
			Some(_) if report.failure.is_some() => {},
			Some(next) =>
				if let Err(err) = self.tracking.save(&next).await {
					tracing::warn!(error = %err, "Changes applied but the cursor was not persisted.");

					report.failure = Some(SyncFailure::from_error(&err));
				},
			None => tracing::debug!("Change feed ended without a new cursor; cursor kept."),
		}

		report.success = report.failure.is_none();
		report.elapsed_ms = elapsed_ms(started);

		tracing::info!(
			changes = report.changes_applied,
			elapsed_ms = report.elapsed_ms,
			errors = report.errors.len(),
			"Sync finished."
		);

		report
	}

	/// Runs a sync now and then every `interval`, replacing any running schedule.
	pub fn start_periodic_sync(self: &Arc<Self>, interval: Duration) {
		self.stop_periodic_sync();

		let coordinator: Weak<Self> = Arc::downgrade(self);
		let schedule = Schedule::spawn("sync", interval, move || {
			let coordinator = coordinator.upgrade()?;

			Some(async move {
				let report = coordinator.sync_once().await;

				if let Some(failure) = report.failure {
					tracing::warn!(%failure, "Scheduled sync did not complete.");
				}
			})
		});

		*self.lock_schedule() = Some(schedule);
	}

	/// Cancels future runs. An in-flight pass finishes. Returns whether a schedule was running.
	pub fn stop_periodic_sync(&self) -> bool {
		match self.lock_schedule().take() {
			Some(schedule) => {
				drop(schedule.stop());

				true
			},
			None => false,
		}
	}

	pub fn is_scheduled(&self) -> bool {
		self.lock_schedule().as_ref().is_some_and(|schedule| !schedule.is_finished())
	}

	/// Follows the change feed from `cursor`, dropping folder entries.
	async fn collect_changes(
		&self,
		cursor: &ChangeCursor,
	) -> crate::Result<(Vec<ChangeEntry>, Option<ChangeCursor>)> {
		let mut changes = Vec::new();
		let mut page_token = cursor.as_str().to_string();
		let mut pages = 0_usize;

		loop {
			let page = self.source.changes_page(&page_token).await?;

			pages += 1;

			changes.extend(page.changes.into_iter().filter(ChangeEntry::is_indexable));

			if let Some(terminal) = page.terminal_cursor {
				tracing::debug!(pages, changes = changes.len(), "Change feed caught up.");

				return Ok((changes, Some(terminal)));
			}

			match page.next_page_cursor {
				Some(next) => page_token = next,
				None => return Ok((changes, None)),
			}
		}
	}

	fn lock_schedule(&self) -> std::sync::MutexGuard<'_, Option<Schedule>> {
		self.schedule.lock().unwrap_or_else(|err| err.into_inner())
	}
}

fn elapsed_ms(started: Instant) -> u64 {
	started.elapsed().as_millis() as u64
}
