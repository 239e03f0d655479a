pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Source is not authenticated.")]
	Authentication,
	#[error("Source error: {message}")]
	Source { message: String },
	#[error("Aborted after {failures} page fetch failures.")]
	AggregateFailure { failures: usize, errors: Vec<String> },
	#[error(transparent)]
	Storage(#[from] sift_storage::Error),
	#[error(transparent)]
	Index(#[from] sift_index::Error),
}
impl From<sift_providers::Error> for Error {
	fn from(err: sift_providers::Error) -> Self {
		match err {
			sift_providers::Error::Unauthorized { .. } => Self::Authentication,
			other => Self::Source { message: other.to_string() },
		}
	}
}
