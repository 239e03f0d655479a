use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::time::{self, Instant};

use crate::{
	Error, Result, SourceConnector,
	cursor::{ChangeTracking, CursorMode},
};
use sift_domain::MetadataRecord;
use sift_index::SearchIndexEngine;

#[derive(Clone, Debug, Default, Serialize)]
pub struct RebuildReport {
	/// True when at least one record was indexed, or when the fetch legitimately found nothing.
	pub success: bool,
	/// The index was already populated and the rebuild was not forced.
	pub skipped: bool,
	pub records_indexed: usize,
	pub elapsed_ms: u64,
	pub errors: Vec<String>,
}

/// Bulk population of the index from the full source listing.
pub struct RebuildJob {
	engine: Arc<SearchIndexEngine>,
	source: Arc<dyn SourceConnector>,
	tracking: ChangeTracking,
	cfg: sift_config::Rebuild,
}
impl RebuildJob {
	pub fn new(
		engine: Arc<SearchIndexEngine>,
		source: Arc<dyn SourceConnector>,
		tracking: ChangeTracking,
		cfg: sift_config::Rebuild,
	) -> Self {
		Self { engine, source, tracking, cfg }
	}

	/// Fetches every record and repopulates the index.
	///
	/// Fails with [`Error::Authentication`] when the source cannot be authenticated and with
	/// [`Error::AggregateFailure`] once page failures exceed the configured bound. Everything else
	/// is collected into the report.
	pub async fn full_rebuild(&self, force: bool) -> Result<RebuildReport> {
		let started = Instant::now();
		let _maintenance = self.engine.maintenance().await;

		if !force && self.engine.is_populated() {
			tracing::info!("Index already populated; skipping rebuild.");

			return Ok(RebuildReport {
				success: true,
				skipped: true,
				records_indexed: self.engine.stats().document_count,
				elapsed_ms: elapsed_ms(started),
				errors: Vec::new(),
			});
		}

		self.ensure_authenticated().await?;

		let mut errors = Vec::new();
		let records = self.fetch_all(&mut errors).await?;

		if records.is_empty() {
			tracing::info!(page_errors = errors.len(), "Source listing is empty; nothing to index.");

			return Ok(RebuildReport {
				success: true,
				skipped: false,
				records_indexed: 0,
				elapsed_ms: elapsed_ms(started),
				errors,
			});
		}

		let (records_indexed, persisted) = self.populate(records, &mut errors).await;

		if records_indexed > 0 && !persisted {
			tracing::warn!("Rebuilt index was not persisted; change cursor left untouched.");

			errors.push("Change cursor not reset because the rebuilt index was not persisted.".into());
		} else if records_indexed > 0
			&& let Err(err) = self.tracking.ensure_cursor(CursorMode::Reset).await
		{
			tracing::warn!(error = %err, "Failed to reset the change cursor after rebuild.");

			errors.push(format!("Change cursor reset failed: {err}"));
		}

		let report = RebuildReport {
			success: records_indexed > 0,
			skipped: false,
			records_indexed,
			elapsed_ms: elapsed_ms(started),
			errors,
		};

		tracing::info!(
			records = report.records_indexed,
			errors = report.errors.len(),
			elapsed_ms = report.elapsed_ms,
			"Rebuild finished."
		);

		Ok(report)
	}

	async fn ensure_authenticated(&self) -> Result<()> {
		if self.source.is_authenticated() {
			return Ok(());
		}

		match self.source.authenticate().await {
			Ok(true) => Ok(()),
			Ok(false) => Err(Error::Authentication),
			Err(err) => {
				tracing::warn!(error = %err, "Source authentication failed.");

				Err(Error::Authentication)
			},
		}
	}

	/// Walks the listing. A failed page is retried from the same cursor.
	async fn fetch_all(&self, errors: &mut Vec<String>) -> Result<Vec<MetadataRecord>> {
		let page_delay = Duration::from_millis(self.cfg.page_delay_ms);
		let mut records = Vec::new();
		let mut cursor: Option<String> = None;
		let mut failures = 0_usize;
		let mut pages = 0_usize;

		loop {
			match self.source.list_page(cursor.as_deref()).await {
				Ok(page) => {
					pages += 1;

					records.extend(page.records.into_iter().filter(|record| !record.is_folder()));

					match page.next_cursor {
						Some(next) => cursor = Some(next),
						None => break,
					}
				},
				Err(Error::Authentication) => return Err(Error::Authentication),
				Err(err) => {
					failures += 1;

					tracing::warn!(error = %err, failures, "Listing page fetch failed.");

					errors.push(format!("Page fetch failed: {err}"));

					if failures > self.cfg.max_page_failures {
						return Err(Error::AggregateFailure {
							failures,
							errors: std::mem::take(errors),
						});
					}
				},
			}

			time::sleep(page_delay).await;
		}

		tracing::debug!(pages, records = records.len(), failures, "Source listing fetched.");

		Ok(records)
	}

	/// Clears the index and re-adds `records` in batches. Returns the verified document count.
	/// Returns the indexed document count and whether the completed snapshot reached the store.
	async fn populate(
		&self,
		records: Vec<MetadataRecord>,
		errors: &mut Vec<String>,
	) -> (usize, bool) {
		let batch_size = self.cfg.batch_size.max(1);
		let batch_delay = Duration::from_millis(self.cfg.batch_delay_ms);
		let fetched = records.len();

		match self.engine.begin_rebuild().await {
			Ok(cleared) => tracing::debug!(cleared, "Index cleared for rebuild."),
			Err(err) => errors.push(format!("Clearing the index snapshot failed: {err}")),
		}

		let mut added = 0_usize;
		let mut batches = records.into_iter().peekable();

		while batches.peek().is_some() {
			let batch: Vec<MetadataRecord> = batches.by_ref().take(batch_size).collect();
			let mutation = self.engine.add_records(batch).await;

			added += mutation.added;

			if !mutation.rejected.is_empty() {
				errors.push(format!("Rejected records without an id: {}", mutation.rejected.join(", ")));
			}
			if let Some(err) = mutation.persist_error {
				errors.push(format!("Batch persistence failed: {err}"));
			}

			if batches.peek().is_some() {
				time::sleep(batch_delay).await;
			}
		}

		let persisted = match self.engine.finish_rebuild().await {
			Ok(()) => true,
			Err(err) => {
				errors.push(format!("Final snapshot write failed: {err}"));

				false
			},
		};

		let indexed = self.engine.stats().document_count;

		if indexed != added {
			tracing::warn!(indexed, added, fetched, "Index size does not match records added.");

			errors.push(format!("Index holds {indexed} documents after adding {added} records."));
		}

		(indexed, persisted)
	}
}

fn elapsed_ms(started: Instant) -> u64 {
	started.elapsed().as_millis() as u64
}
