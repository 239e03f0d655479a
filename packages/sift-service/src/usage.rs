use std::{
	sync::{Arc, Mutex, MutexGuard},
	time::Duration,
};

use crate::schedule::Schedule;
use sift_index::SearchIndexEngine;

/// Periodically persists usage counters once the engine reports a flush is due.
pub struct UsageFlusher {
	engine: Arc<SearchIndexEngine>,
	check_interval: Duration,
	schedule: Mutex<Option<Schedule>>,
}
impl UsageFlusher {
	pub fn new(engine: Arc<SearchIndexEngine>, cfg: &sift_config::Usage) -> Self {
		Self {
			engine,
			check_interval: Duration::from_millis(cfg.check_interval_ms),
			schedule: Mutex::new(None),
		}
	}

	/// Runs one check. Returns whether a flush was attempted.
	pub async fn flush_if_due(&self) -> bool {
		match self.engine.flush_if_due().await {
			None => false,
			Some(Ok(())) => {
				tracing::debug!("Usage counters flushed.");

				true
			},
			Some(Err(err)) => {
				tracing::warn!(error = %err, "Usage flush failed; counters stay pending.");

				true
			},
		}
	}

	pub fn start(&self) {
		self.stop();

		let engine = Arc::downgrade(&self.engine);
		let schedule = Schedule::spawn("usage", self.check_interval, move || {
			let engine = engine.upgrade()?;

			Some(async move {
				if let Some(Err(err)) = engine.flush_if_due().await {
					tracing::warn!(error = %err, "Usage flush failed; counters stay pending.");
				}
			})
		});

		*self.lock_schedule() = Some(schedule);
	}

	pub fn stop(&self) -> bool {
		match self.lock_schedule().take() {
			Some(schedule) => {
				drop(schedule.stop());

				true
			},
			None => false,
		}
	}

	pub fn is_running(&self) -> bool {
		self.lock_schedule().as_ref().is_some_and(|schedule| !schedule.is_finished())
	}

	fn lock_schedule(&self) -> MutexGuard<'_, Option<Schedule>> {
		self.schedule.lock().unwrap_or_else(|err| err.into_inner())
	}
}
