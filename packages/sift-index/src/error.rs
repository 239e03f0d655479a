pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to encode {label} snapshot: {source}")]
	EncodeSnapshot { label: &'static str, source: serde_json::Error },
	#[error("Persisted {label} snapshot is corrupt: {message}")]
	CorruptSnapshot { label: &'static str, message: String },
	#[error("Store access for {label} snapshot failed: {source}")]
	Store { label: &'static str, source: sift_storage::Error },
}
