pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding unavailable: {message}")]
	EmbeddingUnavailable { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Invalid state: {message}")]
	InvalidState { message: String },
}
impl From<pagerag_storage::Error> for Error {
	fn from(err: pagerag_storage::Error) -> Self {
		match err {
			pagerag_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			pagerag_storage::Error::InvalidArgument(message) => Self::Storage { message },
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn storage_errors_map_to_storage() {
		let err = Error::from(pagerag_storage::Error::InvalidArgument("bad vector".to_string()));

		assert!(matches!(err, Error::Storage { ref message } if message == "bad vector"));
	}
}
