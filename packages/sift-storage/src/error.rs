#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Key {key:?} is not present in the store.")]
	NotFound { key: String },
	#[error("Key {key:?} is not a valid store key.")]
	InvalidKey { key: String },
	#[error("Store I/O failed for key {key:?}.")]
	Io { key: String, source: std::io::Error },
	#[error("Store operation {operation} is not supported.")]
	Unsupported { operation: &'static str },
	#[error("{0}")]
	Message(String),
}
