use std::{
	env,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use sift_storage::{CURSOR_KEY, DurableStore, Error, FileStore, INDEX_KEY, MemoryStore};

fn temp_store_dir() -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);

	env::temp_dir().join(format!("sift_store_test_{nanos}_{}_{ordinal}", std::process::id()))
}

async fn exercise(store: &dyn DurableStore) {
	assert!(!store.exists(INDEX_KEY).await.expect("exists failed"));

	let err = store.read(INDEX_KEY).await.expect_err("Expected missing key.");

	assert!(matches!(err, Error::NotFound { .. }), "Unexpected error: {err}");

	store.write(INDEX_KEY, "{\"generation\":1}").await.expect("write failed");
	store.write(CURSOR_KEY, "cursor-1").await.expect("write failed");
	store.write(CURSOR_KEY, "cursor-2").await.expect("overwrite failed");

	assert!(store.exists(INDEX_KEY).await.expect("exists failed"));
	assert_eq!(store.read(CURSOR_KEY).await.expect("read failed"), "cursor-2");

	store.clear().await.expect("clear failed");

	assert!(!store.exists(INDEX_KEY).await.expect("exists failed"));
	assert!(!store.exists(CURSOR_KEY).await.expect("exists failed"));
}

#[tokio::test]
async fn memory_store_reads_back_writes() {
	let store = MemoryStore::new();

	exercise(&store).await;

	assert!(store.is_empty());
}

#[tokio::test]
async fn file_store_reads_back_writes() {
	let dir = temp_store_dir();
	let store = FileStore::open(&dir).await.expect("Failed to open file store.");

	exercise(&store).await;

	std::fs::remove_dir_all(&dir).expect("Failed to remove store dir.");
}

#[tokio::test]
async fn file_store_survives_reopen() {
	let dir = temp_store_dir();

	{
		let store = FileStore::open(&dir).await.expect("Failed to open file store.");

		store.write(CURSOR_KEY, "cursor-7").await.expect("write failed");
	}

	let reopened = FileStore::open(&dir).await.expect("Failed to reopen file store.");

	assert_eq!(reopened.read(CURSOR_KEY).await.expect("read failed"), "cursor-7");
	assert!(!dir.join("cursor.json.tmp").exists());

	std::fs::remove_dir_all(&dir).expect("Failed to remove store dir.");
}

#[tokio::test]
async fn leftover_temp_file_is_replaced_by_the_next_write() {
	let dir = temp_store_dir();
	let store = FileStore::open(&dir).await.expect("Failed to open file store.");

	store.write(INDEX_KEY, "{\"generation\":1,\"documents\":[1,2,3]}").await.expect("write failed");
	std::fs::write(dir.join("index.json.tmp"), "").expect("Failed to plant temp file.");
	store.write(INDEX_KEY, "{\"generation\":2}").await.expect("write failed");

	assert_eq!(store.read(INDEX_KEY).await.expect("read failed"), "{\"generation\":2}");
	assert_eq!(
		std::fs::read_to_string(dir.join("index.json")).expect("Failed to read store file."),
		"{\"generation\":2}"
	);
	assert!(!dir.join("index.json.tmp").exists());

	std::fs::remove_dir_all(&dir).expect("Failed to remove store dir.");
}

#[tokio::test]
async fn keys_outside_the_safe_alphabet_are_rejected() {
	let store = MemoryStore::new();
	let err = store.write("../escape", "x").await.expect_err("Expected invalid key.");

	assert!(matches!(err, Error::InvalidKey { .. }), "Unexpected error: {err}");

	let dir = temp_store_dir();
	let file_store = FileStore::open(&dir).await.expect("Failed to open file store.");

	assert!(file_store.write("a/b", "x").await.is_err());

	std::fs::remove_dir_all(&dir).expect("Failed to remove store dir.");
}
