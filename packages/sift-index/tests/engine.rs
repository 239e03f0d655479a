use std::{
	collections::HashSet,
	sync::{Arc, Mutex},
	time::Duration,
};

use time::{Duration as TimeDuration, OffsetDateTime, macros::datetime};

use sift_domain::{CategoryFamily, ChangeEntry, MetadataRecord};
use sift_index::SearchIndexEngine;
use sift_storage::{
	BoxFuture, DurableStore, Error as StoreError, INDEX_KEY, METADATA_KEY, MemoryStore,
	Result as StoreResult,
};

const NOW: OffsetDateTime = datetime!(2026-10-01 12:00 UTC);

/// Memory store whose writes to selected keys fail.
#[derive(Default)]
struct FailingStore {
	inner: MemoryStore,
	failing: Mutex<HashSet<String>>,
}
impl FailingStore {
	fn fail(&self, key: &str) {
		self.failing.lock().unwrap_or_else(|err| err.into_inner()).insert(key.to_string());
	}
}
impl DurableStore for FailingStore {
	fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
		self.inner.exists(key)
	}

	fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<String>> {
		self.inner.read(key)
	}

	fn write<'a>(&'a self, key: &'a str, data: &'a str) -> BoxFuture<'a, StoreResult<()>> {
		if self.failing.lock().unwrap_or_else(|err| err.into_inner()).contains(key) {
			return Box::pin(async move { Err(StoreError::Message(format!("disk full: {key}"))) });
		}

		self.inner.write(key, data)
	}
}

fn record(id: &str, name: &str, category: &str, age_days: i64) -> MetadataRecord {
	MetadataRecord::new(id, name, category, NOW - TimeDuration::days(age_days))
}

async fn ready_engine(store: Arc<dyn DurableStore>) -> SearchIndexEngine {
	let engine = SearchIndexEngine::new(store, Default::default(), Default::default());

	engine.initialize().await;

	engine
}

fn ids(engine: &SearchIndexEngine, query: &str) -> Vec<String> {
	engine.search_at(query, 10, None, NOW).into_iter().map(|hit| hit.record.id).collect()
}

fn assert_invariant(engine: &SearchIndexEngine) {
	let (indexed, keyed) = engine.id_sets();

	assert_eq!(indexed, keyed, "Indexed ids and metadata keys diverged.");
}

#[tokio::test]
async fn budget_example_ranks_recent_file_first() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine
		.add_records(vec![
			record("a", "Budget.xlsx", "spreadsheet", 10),
			record("b", "Budget Notes.docx", "document", 1),
		])
		.await;

	let hits = engine.search_at("budget", 10, None, NOW);

	assert_eq!(hits.len(), 2);
	assert_eq!(hits[0].record.id, "b");
	assert_eq!(hits[1].record.id, "a");
	assert!((hits[0].relevance - hits[1].relevance).abs() < 1e-12);
}

#[tokio::test]
async fn open_count_breaks_ties_between_equally_recent_records() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine
		.add_records(vec![
			record("x", "Roadmap.txt", "text/plain", 3),
			record("y", "Roadmap.txt", "text/plain", 3),
		])
		.await;

	assert!(engine.track_usage("y"));
	assert!(engine.track_usage("y"));

	assert_eq!(ids(&engine, "roadmap"), vec!["y", "x"]);
	assert_eq!(engine.get("y").expect("missing record").open_count, 2);
	assert!(engine.get("y").expect("missing record").last_opened_at.is_some());
}

#[tokio::test]
async fn name_outweighs_type_keywords_and_path_tokens() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine
		.add_records(vec![
			record("name", "Finance Summary.txt", "text/plain", 5),
			record("path", "Summary.txt", "text/plain", 5).with_path("/Finance"),
			record("sheet-name", "Spreadsheet Tips.txt", "text/plain", 5),
			record("sheet-type", "Q3 Numbers", "spreadsheet", 5),
		])
		.await;

	assert_eq!(ids(&engine, "finance"), vec!["name", "path"]);
	assert_eq!(ids(&engine, "spreadsheet"), vec!["sheet-name", "sheet-type"]);
}

#[tokio::test]
async fn prefix_and_fuzzy_queries_match() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;

	assert_eq!(ids(&engine, "budg"), vec!["a"]);
	assert_eq!(ids(&engine, "budgt"), vec!["a"]);
	assert!(ids(&engine, "zebra").is_empty());
}

#[tokio::test]
async fn single_letter_queries_match_names_and_prefixes() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine
		.add_records(vec![
			record("budget", "Budget.xlsx", "spreadsheet", 1),
			record("letter", "B.txt", "text/plain", 1),
			record("other", "Notes.txt", "text/plain", 1),
		])
		.await;

	assert_eq!(ids(&engine, "b"), vec!["letter", "budget"]);
	assert_eq!(ids(&engine, "B"), vec!["letter", "budget"]);
}

#[tokio::test]
async fn empty_queries_return_nothing() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;

	assert!(ids(&engine, "").is_empty());
	assert!(ids(&engine, "  !! ").is_empty());
	assert!(engine.search_at("budget", 0, None, NOW).is_empty());
}

#[tokio::test]
async fn filter_predicate_and_limit_apply() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine
		.add_records(vec![
			record("a", "Plan.xlsx", "spreadsheet", 1),
			record("b", "Plan.docx", "document", 2),
			record("c", "Plan v2.xlsx", "spreadsheet", 3),
		])
		.await;

	let only_sheets = |record: &MetadataRecord| record.family() == CategoryFamily::Spreadsheet;
	let hits = engine.search_at("plan", 10, Some(&only_sheets), NOW);

	assert_eq!(hits.iter().map(|hit| hit.record.id.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
	assert_eq!(engine.search_at("plan", 1, None, NOW).len(), 1);
}

#[tokio::test]
async fn repeated_updates_keep_one_projection_per_id() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;
	let original = record("a", "Draft.txt", "text/plain", 1);
	let renamed = record("a", "Final.txt", "text/plain", 0);

	engine.add_records(vec![original]).await;

	for _ in 0..3 {
		let mutation = engine.update_records(vec![renamed.clone()]).await;

		assert_eq!(mutation.updated, 1);
		assert!(mutation.is_persisted());
	}

	assert_eq!(engine.stats().document_count, 1);
	assert_eq!(ids(&engine, "final"), vec!["a"]);
	assert!(ids(&engine, "draft").is_empty());
	assert_invariant(&engine);
}

#[tokio::test]
async fn id_sets_stay_equal_across_mutations() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine
		.add_records(vec![record("a", "One.txt", "text/plain", 1), record("b", "Two.txt", "text/plain", 1)])
		.await;
	assert_invariant(&engine);

	engine.add_records(vec![record("a", "One again.txt", "text/plain", 0)]).await;
	assert_invariant(&engine);
	assert_eq!(engine.stats().document_count, 2);

	let mutation = engine.remove_records(&["b".to_string(), "missing".to_string()]).await;

	assert_eq!(mutation.removed, 1);
	assert_invariant(&engine);

	engine
		.apply_changes(vec![
			ChangeEntry::upsert(record("c", "Three.txt", "text/plain", 0)),
			ChangeEntry::removal("a"),
			ChangeEntry { id: "ghost".to_string(), removed: false, record: None },
		])
		.await;
	assert_invariant(&engine);
	assert_eq!(engine.id_sets().0, vec!["c".to_string()]);

	engine.replace_all(vec![record("d", "Four.txt", "text/plain", 0)]).await;
	assert_invariant(&engine);
	assert_eq!(engine.id_sets().1, vec!["d".to_string()]);
}

#[tokio::test]
async fn records_without_ids_are_rejected() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;
	let mutation = engine.add_records(vec![record("", "Orphan.txt", "text/plain", 0)]).await;

	assert_eq!(mutation.applied(), 0);
	assert_eq!(mutation.rejected, vec!["Orphan.txt".to_string()]);
	assert!(!engine.is_populated());
}

#[tokio::test]
async fn change_application_preserves_local_usage() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine.add_records(vec![record("a", "Report.pdf", "application/pdf", 2)]).await;
	engine.track_usage("a");

	let mutation = engine
		.apply_changes(vec![ChangeEntry::upsert(record("a", "Report v2.pdf", "application/pdf", 0))])
		.await;

	assert_eq!(mutation.updated, 1);

	let stored = engine.get("a").expect("missing record");

	assert_eq!(stored.name, "Report v2.pdf");
	assert_eq!(stored.open_count, 1);
}

#[tokio::test]
async fn snapshot_round_trip_reproduces_results() {
	let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
	let first = ready_engine(store.clone()).await;

	first
		.add_records(vec![
			record("a", "Budget.xlsx", "spreadsheet", 10),
			record("b", "Budget Notes.docx", "document", 1),
			record("c", "Team Offsite.pptx", "presentation", 4).with_path("/Events/2026"),
		])
		.await;
	first.track_usage("c");
	first.flush().await.expect("flush failed");

	let second = ready_engine(store).await;

	for query in ["budget", "offsite", "events", "notes", "presentation", "budg"] {
		let expected = first.search_at(query, 10, None, NOW);
		let actual = second.search_at(query, 10, None, NOW);

		assert_eq!(
			expected.iter().map(|hit| (&hit.record, hit.score)).collect::<Vec<_>>(),
			actual.iter().map(|hit| (&hit.record, hit.score)).collect::<Vec<_>>(),
			"Query {query:?} diverged after reload."
		);
	}

	assert_eq!(second.stats().document_count, 3);
}

#[tokio::test]
async fn corrupt_snapshot_yields_empty_ready_index() {
	let store = Arc::new(MemoryStore::new());

	store.insert(INDEX_KEY, "{not json");
	store.insert(METADATA_KEY, "[]");

	let engine = ready_engine(store).await;
	let stats = engine.stats();

	assert!(stats.ready);
	assert_eq!(stats.document_count, 0);
	assert!(ids(&engine, "anything").is_empty());
}

#[tokio::test]
async fn half_missing_snapshot_is_discarded() {
	let store = Arc::new(MemoryStore::new());

	{
		let engine = ready_engine(store.clone()).await;

		engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;
	}

	let index_only = Arc::new(MemoryStore::new());

	index_only.insert(INDEX_KEY, store.get(INDEX_KEY).expect("index snapshot missing"));

	let engine = ready_engine(index_only).await;

	assert!(engine.is_ready());
	assert!(!engine.is_populated());
}

#[tokio::test]
async fn torn_write_between_snapshot_keys_is_discarded() {
	let store = Arc::new(FailingStore::default());

	{
		let engine = ready_engine(store.clone()).await;

		engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;

		store.fail(METADATA_KEY);

		let mutation = engine.add_records(vec![record("b", "Notes.txt", "text/plain", 1)]).await;

		assert!(!mutation.is_persisted());
		assert_eq!(engine.stats().document_count, 2);
	}

	let reloaded = ready_engine(store).await;

	assert!(reloaded.is_ready());
	assert_eq!(reloaded.stats().document_count, 0);
}

#[tokio::test]
async fn unfinished_rebuild_snapshot_is_discarded() {
	let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());

	{
		let engine = ready_engine(store.clone()).await;

		engine.begin_rebuild().await.expect("begin failed");
		engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;
	}

	assert!(!ready_engine(store.clone()).await.is_populated());

	{
		let engine = ready_engine(store.clone()).await;

		engine.begin_rebuild().await.expect("begin failed");
		engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;
		engine.finish_rebuild().await.expect("finish failed");
	}

	assert!(ready_engine(store).await.is_populated());
}

#[tokio::test]
async fn persistence_failures_do_not_lose_in_memory_state() {
	let store = Arc::new(FailingStore::default());

	store.fail(INDEX_KEY);

	let engine = ready_engine(store).await;
	let mutation = engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;

	assert_eq!(mutation.added, 1);
	assert!(mutation.persist_error.is_some());
	assert_eq!(ids(&engine, "budget"), vec!["a"]);
}

#[tokio::test]
async fn usage_flush_is_due_after_max_pending_mutations() {
	let store = Arc::new(MemoryStore::new());
	let engine = ready_engine(store.clone()).await;

	engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;

	let max_pending = sift_config::Usage::default().max_pending;

	for _ in 0..max_pending - 1 {
		engine.track_usage("a");
	}

	assert!(!engine.usage_flush_due());
	assert!(engine.flush_if_due().await.is_none());

	engine.track_usage("a");

	assert!(engine.usage_flush_due());
	assert!(matches!(engine.flush_if_due().await, Some(Ok(()))));
	assert_eq!(engine.stats().pending_usage, 0);

	let reloaded = ready_engine(store).await;

	assert_eq!(reloaded.get("a").expect("missing record").open_count, max_pending as u64);
}

#[tokio::test(start_paused = true)]
async fn usage_flush_is_due_after_max_delay() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;

	assert!(engine.track_usage("a"));
	assert!(!engine.track_usage("missing"));
	assert!(!engine.usage_flush_due());

	let max_delay = Duration::from_millis(sift_config::Usage::default().max_delay_ms);

	tokio::time::advance(max_delay).await;

	assert!(engine.usage_flush_due());
}

#[tokio::test]
async fn failed_flush_keeps_usage_pending() {
	let store = Arc::new(FailingStore::default());
	let engine = ready_engine(store.clone()).await;

	engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;
	engine.track_usage("a");
	store.fail(INDEX_KEY);

	assert!(engine.flush().await.is_err());
	assert_eq!(engine.stats().pending_usage, 1);
}

#[tokio::test]
async fn recent_orders_by_last_open_then_modification() {
	let engine = ready_engine(Arc::new(MemoryStore::new())).await;

	engine
		.add_records(vec![
			record("old", "Old.txt", "text/plain", 30),
			record("new", "New.txt", "text/plain", 1),
			record("opened", "Opened.txt", "text/plain", 60),
		])
		.await;
	engine.track_usage("opened");

	let recent: Vec<String> = engine.recent(3).into_iter().map(|record| record.id).collect();

	assert_eq!(recent, vec!["opened", "new", "old"]);
}

#[tokio::test]
async fn engine_is_not_searchable_before_initialize() {
	let engine = SearchIndexEngine::new(
		Arc::new(MemoryStore::new()),
		Default::default(),
		Default::default(),
	);

	engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet", 1)]).await;

	assert!(!engine.stats().ready);
	assert!(ids(&engine, "budget").is_empty());
}
