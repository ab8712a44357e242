use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{Error, PageRagService, Result, corrective::QueryTrace};

#[derive(Clone, Debug, Deserialize)]
pub struct QueryRequest {
	pub query: String,
	pub k: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryResponse {
	pub answer: String,
	pub in_scope: bool,
	pub trace: QueryTrace,
}

impl PageRagService {
	pub async fn query(&self, req: QueryRequest) -> Result<QueryResponse> {
		let started = Instant::now();
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		// Zero means "use the default", like an absent k.
		let k = req.k.filter(|k| *k > 0).unwrap_or(self.cfg.retrieval.top_k);
		let planner = self.planner();

		if !planner.classify_scope(query).await {
			tracing::info!(query, "Query is out of scope.");

			return Ok(QueryResponse {
				answer: self.cfg.answer.refusal_message.clone(),
				in_scope: false,
				trace: QueryTrace::default(),
			});
		}

		let k = k as usize;
		let fetch_k = (self.cfg.retrieval.fetch_k as usize).max(k);
		let (answer, trace) = self.run_corrective(query, k, fetch_k).await?;

		tracing::info!(
			sub_queries = trace.sub_queries.len(),
			k,
			fetch_k,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Query answered."
		);

		Ok(QueryResponse { answer, in_scope: true, trace })
	}
}
