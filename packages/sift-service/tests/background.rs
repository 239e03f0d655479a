use std::{sync::Arc, time::Duration};

use sift_index::SearchIndexEngine;
use sift_service::{ChangeTracking, SourceConnector, SyncCoordinator, UsageFlusher};
use sift_storage::{CURSOR_KEY, DurableStore, INDEX_KEY};
use sift_testkit::{FakeSource, FlakyStore, record};

const INTERVAL: Duration = Duration::from_secs(60);

async fn coordinator(store: Arc<dyn DurableStore>, source: Arc<FakeSource>) -> Arc<SyncCoordinator> {
	let engine = Arc::new(SearchIndexEngine::new(store.clone(), Default::default(), Default::default()));

	engine.initialize().await;

	let connector: Arc<dyn SourceConnector> = source;
	let tracking = ChangeTracking::new(store, connector.clone());

	Arc::new(SyncCoordinator::new(engine, connector, tracking))
}

async fn settle() {
	tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn periodic_sync_fires_immediately_then_on_each_interval() {
	let store = Arc::new(FlakyStore::new());

	store.insert(CURSOR_KEY, "c0");

	let source = Arc::new(FakeSource::new());
	let sync = coordinator(store, source.clone()).await;

	sync.start_periodic_sync(INTERVAL);
	settle().await;

	assert!(sync.is_scheduled());
	assert_eq!(source.counts().changes, 1);

	tokio::time::sleep(INTERVAL).await;

	assert_eq!(source.counts().changes, 2);

	tokio::time::sleep(INTERVAL).await;

	assert_eq!(source.counts().changes, 3);

	assert!(sync.stop_periodic_sync());
	assert!(!sync.stop_periodic_sync());

	tokio::time::sleep(INTERVAL * 3).await;

	assert_eq!(source.counts().changes, 3);
	assert!(!sync.is_scheduled());
}

#[tokio::test(start_paused = true)]
async fn restarting_replaces_the_running_schedule() {
	let store = Arc::new(FlakyStore::new());

	store.insert(CURSOR_KEY, "c0");

	let source = Arc::new(FakeSource::new());
	let sync = coordinator(store, source.clone()).await;

	sync.start_periodic_sync(INTERVAL);
	sync.start_periodic_sync(INTERVAL);
	settle().await;

	assert_eq!(source.counts().changes, 1);

	tokio::time::sleep(INTERVAL).await;

	assert_eq!(source.counts().changes, 2);

	sync.stop_periodic_sync();
}

#[tokio::test(start_paused = true)]
async fn stopping_lets_an_in_flight_sync_finish() {
	let store = Arc::new(FlakyStore::new());

	store.insert(CURSOR_KEY, "c0");

	let source = Arc::new(FakeSource::new());
	let sync = coordinator(store.clone(), source.clone()).await;
	let gate = source.gate_changes();

	sync.start_periodic_sync(INTERVAL);
	source.changes_entered().await;

	assert!(sync.is_syncing());
	assert!(sync.stop_periodic_sync());

	gate.notify_one();
	settle().await;

	assert!(!sync.is_syncing());
	assert_eq!(source.counts().changes, 1);
	assert_eq!(store.writes(CURSOR_KEY), 1);
}

#[tokio::test(start_paused = true)]
async fn usage_flusher_persists_after_the_delay_bound() {
	let store = Arc::new(FlakyStore::new());
	let usage_cfg = sift_config::Usage::default();
	let engine =
		Arc::new(SearchIndexEngine::new(store.clone(), Default::default(), usage_cfg.clone()));

	engine.initialize().await;
	engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet")]).await;

	let flusher = UsageFlusher::new(engine.clone(), &usage_cfg);
	let baseline = store.writes(INDEX_KEY);

	assert!(engine.track_usage("a"));

	flusher.start();
	settle().await;

	assert!(flusher.is_running());
	assert_eq!(store.writes(INDEX_KEY), baseline);

	tokio::time::sleep(Duration::from_millis(usage_cfg.max_delay_ms)).await;
	settle().await;

	assert_eq!(store.writes(INDEX_KEY), baseline + 1);
	assert_eq!(engine.stats().pending_usage, 0);
	assert!(flusher.stop());
	assert!(!flusher.is_running());
}

#[tokio::test]
async fn usage_flush_triggers_at_the_pending_bound() {
	let store = Arc::new(FlakyStore::new());
	let usage_cfg = sift_config::Usage { max_pending: 3, ..Default::default() };
	let engine =
		Arc::new(SearchIndexEngine::new(store.clone(), Default::default(), usage_cfg.clone()));

	engine.initialize().await;
	engine.add_records(vec![record("a", "Budget.xlsx", "spreadsheet")]).await;

	let flusher = UsageFlusher::new(engine.clone(), &usage_cfg);
	let baseline = store.writes(INDEX_KEY);

	engine.track_usage("a");
	engine.track_usage("a");

	assert!(!flusher.flush_if_due().await);

	engine.track_usage("a");

	assert!(flusher.flush_if_due().await);
	assert_eq!(store.writes(INDEX_KEY), baseline + 1);
}
