use std::{
	cmp::Ordering,
	collections::HashMap,
	sync::{
		Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
		atomic::{AtomicBool, Ordering as AtomicOrdering},
	},
	time::Duration,
};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::{
	sync::{Mutex, MutexGuard},
	time::Instant,
};

use crate::{
	Error, Result,
	document::SearchableDocument,
	fuzzy,
	inverted::InvertedIndex,
	scoring,
	snapshot::{self, IndexSnapshotRef, MetadataSnapshotRef, SNAPSHOT_VERSION},
};
use sift_domain::{ChangeEntry, MetadataRecord, text};
use sift_storage::{DurableStore, INDEX_KEY, METADATA_KEY};

/// Predicate resolved by the caller (for example from filter tags) before the query reaches the
/// index.
pub type RecordFilter = dyn Fn(&MetadataRecord) -> bool + Send + Sync;

#[derive(Clone, Debug, Serialize)]
pub struct SearchHit {
	pub record: MetadataRecord,
	pub score: f64,
	/// Text relevance before the recency and frequency multiplier.
	pub relevance: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
	pub document_count: usize,
	pub term_count: usize,
	pub ready: bool,
	pub pending_usage: usize,
}

/// Outcome of one mutating batch. The in-memory change has happened even when `persist_error` is
/// set; only durability for the current run is affected.
#[derive(Debug, Default)]
pub struct Mutation {
	pub added: usize,
	pub updated: usize,
	pub removed: usize,
	/// Records refused because they cannot be keyed: the change id, or the name when the id is
	/// blank.
	pub rejected: Vec<String>,
	pub persist_error: Option<Error>,
}
impl Mutation {
	pub fn applied(&self) -> usize {
		self.added + self.updated + self.removed
	}

	pub fn is_persisted(&self) -> bool {
		self.persist_error.is_none()
	}
}

#[derive(Debug, Default)]
struct PendingUsage {
	count: usize,
	oldest: Option<Instant>,
}

#[derive(Debug)]
struct IndexState {
	index: InvertedIndex,
	records: HashMap<String, MetadataRecord>,
	generation: u64,
	complete: bool,
	usage: PendingUsage,
}
impl IndexState {
	fn empty() -> Self {
		Self {
			index: InvertedIndex::default(),
			records: HashMap::new(),
			generation: 0,
			complete: true,
			usage: PendingUsage::default(),
		}
	}

	fn upsert(&mut self, record: MetadataRecord) -> bool {
		let existed = self.records.contains_key(&record.id);

		self.index.insert(SearchableDocument::project(&record));
		self.records.insert(record.id.clone(), record);

		existed
	}

	fn remove(&mut self, id: &str) -> bool {
		let had_doc = self.index.remove(id).is_some();
		let had_record = self.records.remove(id).is_some();

		had_doc || had_record
	}

	fn clear(&mut self) {
		self.index.clear();
		self.records.clear();
	}
}

/// In-memory inverted index over [`MetadataRecord`]s, persisted to a [`DurableStore`] after every
/// mutating batch.
///
/// Bulk maintenance (rebuild, delta application) must hold [`SearchIndexEngine::maintenance`] so
/// two maintainers never interleave. Queries only take the state read lock.
pub struct SearchIndexEngine {
	store: Arc<dyn DurableStore>,
	cfg: sift_config::Index,
	usage_cfg: sift_config::Usage,
	state: RwLock<IndexState>,
	ready: AtomicBool,
	maintenance: Mutex<()>,
	persist_lock: Mutex<()>,
}
impl SearchIndexEngine {
	pub fn new(
		store: Arc<dyn DurableStore>,
		cfg: sift_config::Index,
		usage_cfg: sift_config::Usage,
	) -> Self {
		Self {
			store,
			cfg,
			usage_cfg,
			state: RwLock::new(IndexState::empty()),
			ready: AtomicBool::new(false),
			maintenance: Mutex::new(()),
			persist_lock: Mutex::new(()),
		}
	}

	/// Loads the persisted snapshot. A missing, corrupt, torn or half-rebuilt snapshot leaves the
	/// engine empty; this never fails.
	pub async fn initialize(&self) -> IndexStats {
		match self.load_snapshot().await {
			Ok(Some((index, metadata))) => {
				let mut state = self.write_state();

				state.clear();

				for doc in index.documents {
					state.index.insert(doc);
				}
				for record in metadata.records {
					state.records.insert(record.id.clone(), record);
				}

				state.generation = index.generation;
				state.complete = true;

				tracing::info!(
					documents = state.index.len(),
					generation = state.generation,
					"Index snapshot loaded."
				);
			},
			Ok(None) => {
				*self.write_state() = IndexState::empty();

				tracing::info!("No persisted index snapshot; starting empty.");
			},
			Err(err) => {
				*self.write_state() = IndexState::empty();

				tracing::warn!(error = %err, "Discarding persisted index snapshot; starting empty.");
			},
		}

		self.ready.store(true, AtomicOrdering::SeqCst);

		self.stats()
	}

	pub fn is_ready(&self) -> bool {
		self.ready.load(AtomicOrdering::SeqCst)
	}

	pub fn is_populated(&self) -> bool {
		!self.read_state().records.is_empty()
	}

	pub fn contains(&self, id: &str) -> bool {
		self.read_state().records.contains_key(id)
	}

	pub fn get(&self, id: &str) -> Option<MetadataRecord> {
		self.read_state().records.get(id).cloned()
	}

	pub fn stats(&self) -> IndexStats {
		let state = self.read_state();

		IndexStats {
			document_count: state.index.len(),
			term_count: state.index.term_count(),
			ready: self.is_ready(),
			pending_usage: state.usage.count,
		}
	}

	/// Ids present in the inverted index and in the metadata map, for invariant checks.
	pub fn id_sets(&self) -> (Vec<String>, Vec<String>) {
		let state = self.read_state();
		let mut indexed: Vec<String> = state.index.ids().cloned().collect();
		let mut keyed: Vec<String> = state.records.keys().cloned().collect();

		indexed.sort();
		keyed.sort();

		(indexed, keyed)
	}

	/// Serializes rebuilds and delta application against each other.
	pub async fn maintenance(&self) -> MutexGuard<'_, ()> {
		self.maintenance.lock().await
	}

	/// Inserts records. Ids already present are replaced so the index never holds two
	/// projections for one id; callers that know a record exists should use `update_records`.
	pub async fn add_records(&self, records: Vec<MetadataRecord>) -> Mutation {
		let mut mutation = Mutation::default();

		{
			let mut state = self.write_state();

			for record in records {
				if record.id.trim().is_empty() {
					mutation.rejected.push(record.name);

					continue;
				}

				if state.upsert(record) {
					mutation.updated += 1;
				} else {
					mutation.added += 1;
				}
			}
		}

		if mutation.updated > 0 {
			tracing::debug!(replaced = mutation.updated, "Add replaced existing records.");
		}

		self.finish_mutation(mutation).await
	}

	/// Replaces each record's projection and metadata wholesale.
	pub async fn update_records(&self, records: Vec<MetadataRecord>) -> Mutation {
		let mut mutation = Mutation::default();

		{
			let mut state = self.write_state();

			for record in records {
				if record.id.trim().is_empty() {
					mutation.rejected.push(record.name);

					continue;
				}

				state.remove(&record.id);

				let id = record.id.clone();

				state.upsert(record);

				tracing::trace!(%id, "Record replaced.");

				mutation.updated += 1;
			}
		}

		self.finish_mutation(mutation).await
	}

	/// Removes records by id. Unknown ids are ignored.
	pub async fn remove_records(&self, ids: &[String]) -> Mutation {
		let mut mutation = Mutation::default();

		{
			let mut state = self.write_state();

			for id in ids {
				if state.remove(id) {
					mutation.removed += 1;
				}
			}
		}

		self.finish_mutation(mutation).await
	}

	/// Clears the index and repopulates it from `records`.
	pub async fn replace_all(&self, records: Vec<MetadataRecord>) -> Mutation {
		let mut mutation = Mutation::default();

		{
			let mut state = self.write_state();

			mutation.removed = state.records.len();

			state.clear();

			for record in records {
				if record.id.trim().is_empty() {
					mutation.rejected.push(record.name);

					continue;
				}

				state.upsert(record);

				mutation.added += 1;
			}

			state.complete = true;
		}

		self.finish_mutation(mutation).await
	}

	/// Empties the index ahead of a batched rebuild. Snapshots written until
	/// [`SearchIndexEngine::finish_rebuild`] are marked incomplete and ignored on load.
	pub async fn begin_rebuild(&self) -> Result<usize> {
		let cleared = {
			let mut state = self.write_state();
			let cleared = state.records.len();

			state.clear();

			state.complete = false;

			cleared
		};

		self.persist().await?;

		Ok(cleared)
	}

	pub async fn finish_rebuild(&self) -> Result<()> {
		self.write_state().complete = true;

		self.persist().await
	}

	/// Applies a change feed delta in one pass and persists once.
	///
	/// Removals (or entries without a payload) delete; payloads for known ids update, others add.
	/// Usage counters are local state, so they survive source-side modifications.
	pub async fn apply_changes(&self, changes: Vec<ChangeEntry>) -> Mutation {
		let mut mutation = Mutation::default();

		{
			let mut state = self.write_state();

			for entry in changes {
				let ChangeEntry { id, removed, record } = entry;
				let mut record = match record {
					Some(record) if !removed => record,
					_ => {
						if state.remove(&id) {
							mutation.removed += 1;
						}

						continue;
					},
				};

				if record.id.is_empty() {
					record.id = id.clone();
				}
				if record.id != id || id.trim().is_empty() {
					mutation.rejected.push(id);

					continue;
				}

				let existing_usage = state
					.records
					.get(&id)
					.map(|existing| (existing.open_count, existing.last_opened_at));

				match existing_usage {
					Some((open_count, last_opened_at)) => {
						if record.open_count == 0 && record.last_opened_at.is_none() {
							record.open_count = open_count;
							record.last_opened_at = last_opened_at;
						}

						state.upsert(record);

						mutation.updated += 1;
					},
					None => {
						state.upsert(record);

						mutation.added += 1;
					},
				}
			}
		}

		self.finish_mutation(mutation).await
	}

	pub fn search(&self, query: &str, limit: usize, filter: Option<&RecordFilter>) -> Vec<SearchHit> {
		self.search_at(query, limit, filter, OffsetDateTime::now_utc())
	}

	/// Like [`SearchIndexEngine::search`] with an explicit clock for recency.
	pub fn search_at(
		&self,
		query: &str,
		limit: usize,
		filter: Option<&RecordFilter>,
		now: OffsetDateTime,
	) -> Vec<SearchHit> {
		if limit == 0 || !self.is_ready() {
			return Vec::new();
		}

		let tokens = text::tokenize(query);

		if tokens.is_empty() {
			return Vec::new();
		}

		let state = self.read_state();
		let total_docs = state.index.len();
		let mut relevance: HashMap<&str, f64> = HashMap::new();

		for token in &tokens {
			let max_distance =
				fuzzy::max_distance_for(token, self.cfg.fuzzy_ratio, self.cfg.max_edit_distance);
			let mut best: HashMap<&str, f64> = HashMap::new();

			for (term, kind) in state.index.matching_terms(token, self.cfg.prefix, max_distance) {
				let Some(postings) = state.index.postings(term) else { continue };
				let weight = scoring::match_quality(token, term, kind)
					* scoring::idf(total_docs, postings.len());

				for (id, mask) in postings {
					let score = weight * scoring::field_weight(&self.cfg, *mask);
					let slot = best.entry(id.as_str()).or_insert(0.0);

					if score > *slot {
						*slot = score;
					}
				}
			}

			for (id, score) in best {
				*relevance.entry(id).or_insert(0.0) += score;
			}
		}

		let mut hits = Vec::new();

		for (id, relevance) in relevance {
			let Some(record) = state.records.get(id) else { continue };

			if relevance <= 0.0 {
				continue;
			}
			if let Some(filter) = filter
				&& !filter(record)
			{
				continue;
			}

			let score =
				scoring::final_score(&self.cfg, relevance, record.age_days(now), record.open_count);

			hits.push(SearchHit { record: record.clone(), score, relevance });
		}

		hits.sort_by(compare_hits);
		hits.truncate(limit);

		hits
	}

	/// Most recently used records first, falling back to modification time.
	pub fn recent(&self, limit: usize) -> Vec<MetadataRecord> {
		let state = self.read_state();
		let mut records: Vec<&MetadataRecord> = state.records.values().collect();

		records.sort_by(|a, b| {
			b.last_opened_at
				.cmp(&a.last_opened_at)
				.then_with(|| b.modified_at.cmp(&a.modified_at))
				.then_with(|| a.id.cmp(&b.id))
		});

		records.into_iter().take(limit).cloned().collect()
	}

	/// Counts an open of `id`. Returns `false` for unknown ids.
	///
	/// The mutation is only persisted by the next flush; see [`SearchIndexEngine::flush_if_due`].
	pub fn track_usage(&self, id: &str) -> bool {
		let mut state = self.write_state();
		let Some(record) = state.records.get_mut(id) else { return false };

		record.open_count += 1;
		record.last_opened_at = Some(OffsetDateTime::now_utc());

		state.usage.count += 1;

		if state.usage.oldest.is_none() {
			state.usage.oldest = Some(Instant::now());
		}

		true
	}

	/// Whether pending usage has hit the count bound or the oldest mutation the delay bound.
	pub fn usage_flush_due(&self) -> bool {
		let state = self.read_state();
		let max_delay = Duration::from_millis(self.usage_cfg.max_delay_ms);

		match state.usage.oldest {
			None => false,
			Some(oldest) =>
				state.usage.count >= self.usage_cfg.max_pending || oldest.elapsed() >= max_delay,
		}
	}

	/// Persists when [`SearchIndexEngine::usage_flush_due`] holds. Returns `None` if nothing was
	/// due.
	pub async fn flush_if_due(&self) -> Option<Result<()>> {
		if !self.usage_flush_due() {
			return None;
		}

		Some(self.persist().await)
	}

	pub async fn flush(&self) -> Result<()> {
		self.persist().await
	}

	async fn finish_mutation(&self, mut mutation: Mutation) -> Mutation {
		if !mutation.rejected.is_empty() {
			tracing::warn!(rejected = mutation.rejected.len(), "Records without an id were rejected.");
		}

		if let Err(err) = self.persist().await {
			tracing::warn!(error = %err, "Index mutation applied in memory but not persisted.");

			mutation.persist_error = Some(err);
		}

		mutation
	}

	/// Writes the index snapshot, then the metadata snapshot, both stamped with a fresh
	/// generation.
	async fn persist(&self) -> Result<()> {
		let _guard = self.persist_lock.lock().await;
		let (index_raw, metadata_raw, taken) = {
			let mut state = self.write_state();

			state.generation += 1;

			let encoded = encode(&state)?;
			let taken = std::mem::take(&mut state.usage);

			(encoded.0, encoded.1, taken)
		};
		let result = async {
			self.store
				.write(INDEX_KEY, &index_raw)
				.await
				.map_err(|err| Error::Store { label: "index", source: err })?;
			self.store
				.write(METADATA_KEY, &metadata_raw)
				.await
				.map_err(|err| Error::Store { label: "metadata", source: err })
		}
		.await;

		if result.is_err() {
			let mut state = self.write_state();

			state.usage.count += taken.count;
			state.usage.oldest = match (state.usage.oldest, taken.oldest) {
				(Some(a), Some(b)) => Some(a.min(b)),
				(a, b) => a.or(b),
			};
		}

		result
	}

	async fn load_snapshot(
		&self,
	) -> Result<Option<(snapshot::IndexSnapshot, snapshot::MetadataSnapshot)>> {
		let has_index = self
			.store
			.exists(INDEX_KEY)
			.await
			.map_err(|err| Error::Store { label: "index", source: err })?;
		let has_metadata = self
			.store
			.exists(METADATA_KEY)
			.await
			.map_err(|err| Error::Store { label: "metadata", source: err })?;

		match (has_index, has_metadata) {
			(false, false) => return Ok(None),
			(true, true) => {},
			(true, false) =>
				return Err(Error::CorruptSnapshot {
					label: "metadata",
					message: "missing while the index snapshot exists".to_string(),
				}),
			(false, true) =>
				return Err(Error::CorruptSnapshot {
					label: "index",
					message: "missing while the metadata snapshot exists".to_string(),
				}),
		}

		let index_raw = self
			.store
			.read(INDEX_KEY)
			.await
			.map_err(|err| Error::Store { label: "index", source: err })?;
		let metadata_raw = self
			.store
			.read(METADATA_KEY)
			.await
			.map_err(|err| Error::Store { label: "metadata", source: err })?;

		snapshot::decode(&index_raw, &metadata_raw).map(Some)
	}

	fn read_state(&self) -> RwLockReadGuard<'_, IndexState> {
		self.state.read().unwrap_or_else(|err| err.into_inner())
	}

	fn write_state(&self) -> RwLockWriteGuard<'_, IndexState> {
		self.state.write().unwrap_or_else(|err| err.into_inner())
	}
}

fn encode(state: &IndexState) -> Result<(String, String)> {
	let mut documents: Vec<&SearchableDocument> = state.index.documents().collect();
	let mut records: Vec<&MetadataRecord> = state.records.values().collect();

	documents.sort_by(|a, b| a.id.cmp(&b.id));
	records.sort_by(|a, b| a.id.cmp(&b.id));

	let index_raw = serde_json::to_string(&IndexSnapshotRef {
		version: SNAPSHOT_VERSION,
		generation: state.generation,
		complete: state.complete,
		documents,
	})
	.map_err(|err| Error::EncodeSnapshot { label: "index", source: err })?;
	let metadata_raw = serde_json::to_string(&MetadataSnapshotRef {
		version: SNAPSHOT_VERSION,
		generation: state.generation,
		records,
	})
	.map_err(|err| Error::EncodeSnapshot { label: "metadata", source: err })?;

	Ok((index_raw, metadata_raw))
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
	b.score
		.total_cmp(&a.score)
		.then_with(|| b.relevance.total_cmp(&a.relevance))
		.then_with(|| a.record.id.cmp(&b.record.id))
}
