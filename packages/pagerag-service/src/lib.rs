pub mod answer;
pub mod corrective;
pub mod oracle;
pub mod planner;
pub mod query;
pub mod search;

mod dump;
mod error;

pub use error::{Error, Result};
pub use pagerag_providers::{Error as ProviderError, Result as ProviderResult};
pub use query::{QueryRequest, QueryResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use pagerag_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, WebSearchProviderConfig,
};
use pagerag_providers::{embedding, llm, web_search};
use pagerag_storage::{
	db::Db,
	models::DocumentPage,
	pages::{self, PagePredicate},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>>;
}

pub trait LlmProvider
where
	Self: Send + Sync,
{
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<Value>>;

	fn complete_text<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		temperature: f32,
	) -> BoxFuture<'a, ProviderResult<String>>;
}

/// Web search never fails; an unconfigured or failing backend yields an empty string.
pub trait WebSearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, String>;
}

/// Read-only nearest-neighbour access to ingested pages.
pub trait PageStore
where
	Self: Send + Sync,
{
	fn nearest<'a>(
		&'a self,
		query_vec: &'a [f32],
		predicate: &'a PagePredicate,
		limit: i64,
	) -> BoxFuture<'a, pagerag_storage::Result<Vec<DocumentPage>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub llm: Arc<dyn LlmProvider>,
	pub web_search: Arc<dyn WebSearchProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		llm: Arc<dyn LlmProvider>,
		web_search: Arc<dyn WebSearchProvider>,
	) -> Self {
		Self { embedding, llm, web_search }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), llm: provider.clone(), web_search: provider }
	}
}

pub struct PageRagService {
	pub cfg: Config,
	pub store: Arc<dyn PageStore>,
	pub providers: Providers,
}
impl PageRagService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, store: Arc::new(db), providers: Providers::default() }
	}

	pub fn with_parts(cfg: Config, store: Arc<dyn PageStore>, providers: Providers) -> Self {
		Self { cfg, store, providers }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl LlmProvider for DefaultProviders {
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<Value>> {
		Box::pin(llm::complete_json(cfg, messages))
	}

	fn complete_text<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		temperature: f32,
	) -> BoxFuture<'a, ProviderResult<String>> {
		Box::pin(llm::complete_text(cfg, messages, temperature))
	}
}
impl WebSearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, String> {
		Box::pin(web_search::search(cfg, query))
	}
}

impl PageStore for Db {
	fn nearest<'a>(
		&'a self,
		query_vec: &'a [f32],
		predicate: &'a PagePredicate,
		limit: i64,
	) -> BoxFuture<'a, pagerag_storage::Result<Vec<DocumentPage>>> {
		Box::pin(pages::nearest(&self.pool, query_vec, predicate, limit))
	}
}
