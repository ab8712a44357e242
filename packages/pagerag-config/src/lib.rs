mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Answer, Config, EmbeddingProviderConfig, LlmProviderConfig, Planner, Postgres, Providers,
	Retrieval, Service, Storage, WebSearchProviderConfig,
};

use std::{fs, path::Path};

pub const MAX_SUB_QUERIES_LIMIT: u32 = 3;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.postgres.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.postgres.vector_dim."
				.to_string(),
		});
	}
	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.fetch_k < cfg.retrieval.top_k {
		return Err(Error::Validation {
			message: "retrieval.fetch_k must be greater than or equal to retrieval.top_k."
				.to_string(),
		});
	}
	if !cfg.retrieval.mmr_lambda.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.mmr_lambda must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.retrieval.mmr_lambda) {
		return Err(Error::Validation {
			message: "retrieval.mmr_lambda must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.planner.max_sub_queries == 0 || cfg.planner.max_sub_queries > MAX_SUB_QUERIES_LIMIT {
		return Err(Error::Validation {
			message: format!("planner.max_sub_queries must be in the range 1-{MAX_SUB_QUERIES_LIMIT}."),
		});
	}
	if cfg.providers.web_search.is_configured() && cfg.providers.web_search.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.web_search.timeout_ms must be greater than zero when web search is \
configured."
				.to_string(),
		});
	}
	if cfg.providers.llm.max_parse_attempts == 0 {
		return Err(Error::Validation {
			message: "providers.llm.max_parse_attempts must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("providers.llm.temperature", cfg.providers.llm.temperature),
		("providers.llm.answer_temperature", cfg.providers.llm.answer_temperature),
	] {
		if !value.is_finite() || value < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number, zero or greater."),
			});
		}
	}
	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("llm", &cfg.providers.llm.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	for (label, value) in [
		("answer.refusal_message", &cfg.answer.refusal_message),
		("answer.empty_answer_message", &cfg.answer.empty_answer_message),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let web_search = &mut cfg.providers.web_search;

	if web_search.endpoint.trim().is_empty() {
		web_search.endpoint.clear();
	}
	if web_search.api_key.trim().is_empty() {
		web_search.api_key.clear();
	}
	if cfg.retrieval.debug_dump_dir.as_deref().map(|dir| dir.trim().is_empty()).unwrap_or(false) {
		cfg.retrieval.debug_dump_dir = None;
	}
}
