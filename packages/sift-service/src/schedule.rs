use std::{future::Future, time::Duration};

use tokio::{
	sync::watch,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};

/// A recurring background task. The first tick fires immediately; ticks missed while a run is in
/// flight are skipped.
///
/// Stopping only prevents new runs. A run already in flight finishes.
pub(crate) struct Schedule {
	stop: watch::Sender<bool>,
	handle: JoinHandle<()>,
}
impl Schedule {
	/// Spawns the loop. `tick` returns `None` once its target is gone, which ends the loop.
	pub(crate) fn spawn<F, Fut>(label: &'static str, interval: Duration, mut tick: F) -> Self
	where
		F: FnMut() -> Option<Fut> + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let (stop, mut stopped) = watch::channel(false);
		let period = interval.max(Duration::from_millis(1));
		let handle = tokio::spawn(async move {
			let mut ticker = time::interval(period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

			loop {
				tokio::select! {
					biased;
					changed = stopped.changed() => {
						if changed.is_err() || *stopped.borrow() {
							break;
						}

						continue;
					},
					_ = ticker.tick() => {},
				}

				let Some(run) = tick() else { break };

				run.await;
			}

			tracing::debug!(task = label, "Background schedule stopped.");
		});

		tracing::debug!(task = label, interval_ms = period.as_millis() as u64, "Background schedule started.");

		Self { stop, handle }
	}

	/// Signals the loop to end and returns its handle for callers that want to wait.
	pub(crate) fn stop(self) -> JoinHandle<()> {
		let _ = self.stop.send(true);

		self.handle
	}

	pub(crate) fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}
