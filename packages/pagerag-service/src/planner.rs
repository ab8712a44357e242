//! Language-model backed query planning.
//!
//! Each operation is one typed oracle call. Failures never propagate: they are logged and replaced
//! by a fixed fallback so that planning can only degrade ranking quality, not abort a request.

use std::time::Instant;

use serde::Deserialize;

use pagerag_config::LlmProviderConfig;

use crate::{
	LlmProvider, PageRagService,
	oracle::{self, OracleError, OracleSchema},
	search::FilterSet,
};

pub const KEYWORD_COUNT: usize = 5;

const SCOPE_INSTRUCTIONS: &str = "\
Decide whether the question asks about financial data of companies found in SEC filings \
(10-K, 10-Q, 8-K).
In scope: \"Google revenue in 2024\", \"Amazon operating income Q3 2023\", \
\"cash flows from operating activities Microsoft 2022\".
Out of scope: greetings, weather, arithmetic and anything unrelated to company filings.";
const FILTER_INSTRUCTIONS: &str = "\
Extract filing metadata from the question. Use null for every field the question does not mention.
Company names are lowercase: Amazon/AMZN -> amazon, Google/Alphabet/GOOGL/GOOG -> google, \
Apple/AAPL -> apple, Microsoft/MSFT -> microsoft, Tesla/TSLA -> tesla, Nvidia/NVDA -> nvidia, \
Meta/Facebook/FB -> meta.
Document types: annual report -> 10-k, quarterly report -> 10-q, current report -> 8-k.
Examples:
\"Amazon Q3 2024 revenue\" -> {\"company_name\": \"amazon\", \"doc_type\": \"10-q\", \
\"fiscal_year\": 2024, \"fiscal_quarter\": \"q3\"}
\"Apple 2023 annual report\" -> {\"company_name\": \"apple\", \"doc_type\": \"10-k\", \
\"fiscal_year\": 2023}
\"Tesla profitability\" -> {\"company_name\": \"tesla\"}";
const KEYWORD_INSTRUCTIONS: &str = "\
Generate exactly 5 keyword phrases using the literal terminology of SEC 10-K/10-Q reports.
Statement titles: \"consolidated statements of operations\", \"consolidated balance sheets\", \
\"consolidated statements of cash flows\", \"consolidated statements of stockholders equity\".
Income statement: \"revenue\", \"net revenue\", \"cost of revenue\", \"gross profit\", \
\"operating income\", \"net income\", \"earnings per share\".
Balance sheet: \"total assets\", \"cash and cash equivalents\", \"total liabilities\", \
\"stockholders equity\", \"working capital\", \"long-term debt\".
Cash flows: \"cash flows from operating activities\", \"net cash provided by operating activities\", \
\"cash flows from investing activities\", \"free cash flow\", \"capital expenditures\".
Match the topic of the question and prefer \"cash flows\" and \"stockholders equity\" spellings.";
const DECOMPOSE_INSTRUCTIONS: &str = "\
Split the question into 1 to 3 focused search queries for a vector store.
Each query targets one company, one period and one metric or aspect.
Expand abbreviations (\"rev\" -> \"revenue\", \"GOOGL\" -> \"Google\").
Keep every query self-contained and short (5 to 10 words).";
const GRADE_INSTRUCTIONS: &str = "\
You grade retrieved documents.
is_relevant is true when the documents contain information that can answer the question, and \
false when they are off-topic, irrelevant or empty.";
const REWRITE_INSTRUCTIONS: &str = "\
Rewrite the question so that it retrieves better documents.
Make it more specific, add relevant financial terms (revenue, profit, earnings, cash flow), keep \
the original intent and keep it concise (5 to 12 words).";

#[derive(Debug, Deserialize)]
pub struct QueryScope {
	pub in_scope: bool,
	#[serde(default)]
	pub reason: Option<String>,
}
impl OracleSchema for QueryScope {
	const NAME: &'static str = "classify_scope";

	fn shape() -> &'static str {
		r#"{"in_scope": boolean, "reason": string|null}"#
	}
}

#[derive(Debug, Deserialize)]
pub struct RankingKeywords {
	pub keywords: Vec<String>,
}
impl OracleSchema for RankingKeywords {
	const NAME: &'static str = "generate_keywords";

	fn shape() -> &'static str {
		r#"{"keywords": [string, string, string, string, string]}"#
	}

	fn validate(&self) -> Result<(), String> {
		if self.keywords.len() != KEYWORD_COUNT {
			return Err(format!(
				"Expected exactly {KEYWORD_COUNT} keywords, got {}.",
				self.keywords.len()
			));
		}
		if self.keywords.iter().any(|kw| kw.trim().is_empty()) {
			return Err("Keywords must be non-empty.".to_string());
		}

		Ok(())
	}
}

#[derive(Debug, Deserialize)]
pub struct SearchQueries {
	#[serde(alias = "queries")]
	pub search_queries: Vec<String>,
}
impl OracleSchema for SearchQueries {
	const NAME: &'static str = "decompose";

	fn shape() -> &'static str {
		r#"{"search_queries": [string]}"#
	}
}

#[derive(Debug, Deserialize)]
pub struct GradeDecision {
	pub is_relevant: bool,
	pub reasoning: String,
}
impl OracleSchema for GradeDecision {
	const NAME: &'static str = "grade";

	fn shape() -> &'static str {
		r#"{"is_relevant": boolean, "reasoning": string}"#
	}
}

#[derive(Debug, Deserialize)]
pub struct RewriteQuery {
	pub rewritten_query: String,
}
impl OracleSchema for RewriteQuery {
	const NAME: &'static str = "rewrite";

	fn shape() -> &'static str {
		r#"{"rewritten_query": string}"#
	}
}

pub struct QueryPlanner<'a> {
	llm: &'a dyn LlmProvider,
	cfg: &'a LlmProviderConfig,
	max_sub_queries: usize,
	fail_open: bool,
}
impl<'a> QueryPlanner<'a> {
	pub fn new(
		llm: &'a dyn LlmProvider,
		cfg: &'a LlmProviderConfig,
		planner: &pagerag_config::Planner,
	) -> Self {
		Self {
			llm,
			cfg,
			max_sub_queries: planner.max_sub_queries as usize,
			fail_open: planner.fail_open,
		}
	}

	/// Falls back to `fail_open` on oracle failure.
	pub async fn classify_scope(&self, query: &str) -> bool {
		let started = Instant::now();

		match self.call::<QueryScope>(SCOPE_INSTRUCTIONS, &format!("Question: {query}")).await {
			Ok(scope) => {
				tracing::info!(
					in_scope = scope.in_scope,
					reason = scope.reason.as_deref().unwrap_or_default(),
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Scope classified."
				);

				scope.in_scope
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					fallback = self.fail_open,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Scope classification failed."
				);

				self.fail_open
			},
		}
	}

	/// Falls back to an empty filter set.
	pub async fn extract_filters(&self, query: &str) -> FilterSet {
		let started = Instant::now();

		match self.call::<FilterSet>(FILTER_INSTRUCTIONS, &format!("Question: {query}")).await {
			Ok(filters) => {
				let filters = filters.normalized();

				tracing::info!(
					filters = ?filters,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Filters extracted."
				);

				filters
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Filter extraction failed."
				);

				FilterSet::default()
			},
		}
	}

	/// Falls back to no keywords, which disables both the keyword predicate and the rerank.
	pub async fn generate_keywords(&self, query: &str) -> Vec<String> {
		let started = Instant::now();

		match self.call::<RankingKeywords>(KEYWORD_INSTRUCTIONS, &format!("Question: {query}")).await
		{
			Ok(result) => {
				let keywords =
					result.keywords.into_iter().map(|kw| kw.trim().to_string()).collect::<Vec<_>>();

				tracing::info!(
					keywords = ?keywords,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Ranking keywords generated."
				);

				keywords
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Keyword generation failed."
				);

				Vec::new()
			},
		}
	}

	/// Returns between one and `max_sub_queries` sub-queries; `[query]` when the model gives none.
	pub async fn decompose(&self, query: &str) -> Vec<String> {
		let started = Instant::now();
		let fallback = || vec![query.to_string()];

		match self.call::<SearchQueries>(DECOMPOSE_INSTRUCTIONS, &format!("Question: {query}")).await
		{
			Ok(result) => {
				let queries = result
					.search_queries
					.into_iter()
					.map(|q| q.trim().to_string())
					.filter(|q| !q.is_empty())
					.take(self.max_sub_queries)
					.collect::<Vec<_>>();
				let queries = if queries.is_empty() { fallback() } else { queries };

				tracing::info!(
					sub_queries = ?queries,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Query decomposed."
				);

				queries
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Decomposition failed, using the original query."
				);

				fallback()
			},
		}
	}

	/// Falls back to `fail_open` on oracle failure.
	pub async fn grade(&self, query: &str, documents: &str) -> bool {
		let started = Instant::now();
		let user = format!("Question: {query}\n\nRetrieved documents:\n{documents}");

		match self.call::<GradeDecision>(GRADE_INSTRUCTIONS, &user).await {
			Ok(decision) => {
				tracing::info!(
					is_relevant = decision.is_relevant,
					reasoning = decision.reasoning.as_str(),
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Documents graded."
				);

				decision.is_relevant
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					fallback = self.fail_open,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Grading failed."
				);

				self.fail_open
			},
		}
	}

	/// Falls back to the input when the call fails or the rewrite is blank.
	pub async fn rewrite(&self, query: &str) -> String {
		let started = Instant::now();

		match self.call::<RewriteQuery>(REWRITE_INSTRUCTIONS, &format!("Question: {query}")).await {
			Ok(result) => {
				let rewritten = result.rewritten_query.trim();

				tracing::info!(
					rewritten,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Query rewritten."
				);

				if rewritten.is_empty() { query.to_string() } else { rewritten.to_string() }
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Rewrite failed, keeping the query."
				);

				query.to_string()
			},
		}
	}

	async fn call<T>(&self, instructions: &str, user: &str) -> Result<T, OracleError>
	where
		T: OracleSchema,
	{
		let messages = oracle::schema_messages::<T>(instructions, user);

		oracle::invoke::<T>(self.llm, self.cfg, &messages).await
	}
}

impl PageRagService {
	pub fn planner(&self) -> QueryPlanner<'_> {
		QueryPlanner::new(self.providers.llm.as_ref(), &self.cfg.providers.llm, &self.cfg.planner)
	}
}
