use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	#[serde(default)]
	pub planner: Planner,
	#[serde(default)]
	pub answer: Answer,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	/// Dimension of the `document_pages.embedding` column.
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
	#[serde(default)]
	pub web_search: WebSearchProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	/// Temperature for structured planner calls.
	pub temperature: f32,
	/// Temperature for the final answer.
	#[serde(default = "default_answer_temperature")]
	pub answer_temperature: f32,
	/// How many times a non-JSON completion is re-requested before giving up.
	#[serde(default = "default_max_parse_attempts")]
	pub max_parse_attempts: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

/// An empty `endpoint` or `api_key` leaves web search unconfigured.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WebSearchProviderConfig {
	pub endpoint: String,
	pub api_key: String,
	pub timeout_ms: u64,
	pub max_results: u32,
	pub search_depth: String,
}
impl WebSearchProviderConfig {
	pub fn is_configured(&self) -> bool {
		!self.endpoint.is_empty() && !self.api_key.is_empty()
	}
}
impl Default for WebSearchProviderConfig {
	fn default() -> Self {
		Self {
			endpoint: String::new(),
			api_key: String::new(),
			timeout_ms: 10_000,
			max_results: 3,
			search_depth: "advanced".to_string(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	pub top_k: u32,
	pub fetch_k: u32,
	#[serde(default = "default_mmr_lambda")]
	pub mmr_lambda: f32,
	/// Optional. Directory receiving a Markdown dump of the last retrieved pages.
	pub debug_dump_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Planner {
	pub max_sub_queries: u32,
	/// Degrade to permissive defaults (in scope, relevant) when the language model fails.
	pub fail_open: bool,
}
impl Default for Planner {
	fn default() -> Self {
		Self { max_sub_queries: 3, fail_open: true }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Answer {
	pub language: String,
	pub refusal_message: String,
	pub empty_answer_message: String,
}
impl Default for Answer {
	fn default() -> Self {
		Self {
			language: "English".to_string(),
			refusal_message: "The question is not about financial data from SEC filings. \
Please name the company, the period, and the financial metric."
				.to_string(),
			empty_answer_message: "Could not produce an answer. Please refine the question."
				.to_string(),
		}
	}
}

fn default_answer_temperature() -> f32 {
	0.2
}

fn default_max_parse_attempts() -> u32 {
	3
}

fn default_mmr_lambda() -> f32 {
	0.5
}
