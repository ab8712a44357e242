use std::{fs, path::Path};

pub const DUMP_FILE_NAME: &str = "retrieved_reranked_docs.md";

/// Runs [`write_retrieved`] on the blocking pool.
pub async fn persist_retrieved(dir: Option<&str>, formatted: &str) {
	let Some(dir) = dir.map(str::to_string) else { return };
	let formatted = formatted.to_string();
	let task = tokio::task::spawn_blocking(move || write_retrieved(Some(&dir), &formatted));

	if let Err(err) = task.await {
		tracing::warn!(error = %err, "Retrieval dump task failed.");
	}
}

/// Overwrites the dump file with the latest formatted pages. Failures are logged and ignored.
pub fn write_retrieved(dir: Option<&str>, formatted: &str) {
	let Some(dir) = dir else { return };
	let dir = Path::new(dir);
	let result = fs::create_dir_all(dir).and_then(|_| fs::write(dir.join(DUMP_FILE_NAME), formatted));

	if let Err(err) = result {
		tracing::warn!(error = %err, dir = %dir.display(), "Failed to write retrieval dump.");
	}
}

#[cfg(test)]
mod tests {
	use std::{env, process};

	use super::*;

	#[test]
	fn writes_and_overwrites_dump() {
		let dir = env::temp_dir().join(format!("pagerag_dump_test_{}", process::id()));
		let dir_str = dir.to_string_lossy().to_string();

		write_retrieved(Some(&dir_str), "first");
		write_retrieved(Some(&dir_str), "second");

		let written = fs::read_to_string(dir.join(DUMP_FILE_NAME)).expect("dump missing");

		assert_eq!(written, "second");

		fs::remove_dir_all(&dir).expect("Failed to remove dump dir.");
	}

	#[tokio::test]
	async fn persists_off_the_runtime_thread() {
		let dir = env::temp_dir().join(format!("pagerag_dump_async_test_{}", process::id()));
		let dir_str = dir.to_string_lossy().to_string();

		persist_retrieved(Some(&dir_str), "pages").await;

		let written = fs::read_to_string(dir.join(DUMP_FILE_NAME)).expect("dump missing");

		assert_eq!(written, "pages");

		fs::remove_dir_all(&dir).expect("Failed to remove dump dir.");

		persist_retrieved(None, "ignored").await;
	}

	#[test]
	fn disabled_dump_is_a_no_op() {
		write_retrieved(None, "ignored");
	}
}
