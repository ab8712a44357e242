pub mod filter;
pub mod ranking;

pub use filter::{DocType, FilterSet, FiscalQuarter};

use std::time::Instant;

use pagerag_storage::models::DocumentPage;

use crate::{Error, PageRagService, Result};

impl PageRagService {
	/// Embedding search under the filter and keyword predicate, then MMR down to `k`, then BM25Plus
	/// reranking.
	///
	/// An empty result is not an error. Only an embedding failure aborts the call.
	pub async fn search_pages(
		&self,
		query: &str,
		filters: &FilterSet,
		keywords: &[String],
		k: usize,
		fetch_k: usize,
	) -> Result<Vec<DocumentPage>> {
		let started = Instant::now();
		let fetch_k = fetch_k.max(k);
		let query_vec = self.embed_query(query).await?;
		let embed_ms = started.elapsed().as_millis() as u64;
		let predicate = filters.to_predicate(keywords);
		let db_started = Instant::now();
		let rows = self.store.nearest(&query_vec, &predicate, fetch_k as i64).await?;

		tracing::info!(
			rows = rows.len(),
			fetch_k,
			embed_ms,
			db_ms = db_started.elapsed().as_millis() as u64,
			"Nearest pages fetched."
		);

		if rows.is_empty() {
			tracing::warn!(query, "No pages matched the filters and keywords.");

			return Ok(Vec::new());
		}

		let mmr_started = Instant::now();
		let picked = ranking::diversity::select(
			&query_vec,
			&rows.iter().map(|row| row.embedding.as_slice()).collect::<Vec<_>>(),
			k,
			self.cfg.retrieval.mmr_lambda,
		);
		let mut slots = rows.into_iter().map(Some).collect::<Vec<_>>();
		let mmr_docs =
			picked.into_iter().filter_map(|index| slots[index].take()).collect::<Vec<_>>();

		tracing::debug!(
			selected = mmr_docs.len(),
			mmr_ms = mmr_started.elapsed().as_millis() as u64,
			"Diversity selection finished."
		);

		let rerank_started = Instant::now();
		let ranked = ranking::lexical::rerank(mmr_docs, keywords, k);

		tracing::debug!(
			keywords = keywords.len(),
			rerank_ms = rerank_started.elapsed().as_millis() as u64,
			"Lexical rerank finished."
		);
		tracing::info!(
			returned = ranked.len(),
			total_ms = started.elapsed().as_millis() as u64,
			"Page search finished."
		);

		Ok(ranked)
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let cfg = &self.cfg.providers.embedding;
		let texts = [query.to_string()];
		let mut vectors = self
			.providers
			.embedding
			.embed(cfg, &texts)
			.await
			.map_err(|err| Error::EmbeddingUnavailable { message: err.to_string() })?;

		if vectors.is_empty() {
			return Err(Error::EmbeddingUnavailable {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		}

		let query_vec = vectors.swap_remove(0);

		if query_vec.len() != cfg.dimensions as usize {
			return Err(Error::EmbeddingUnavailable {
				message: format!(
					"Embedding has {} dimensions, expected {}.",
					query_vec.len(),
					cfg.dimensions
				),
			});
		}

		Ok(query_vec)
	}
}
